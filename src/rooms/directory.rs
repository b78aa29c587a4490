use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    db,
    error::{CoreError, CoreResult},
    model::{Draft, ExamType, Participant, Room, RoomListing, RoomStatus, now},
    policy,
    storage::{Upload, require_upload},
};

use super::Rooms;

/// Optional narrowing of the directory, applied over one snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFilter {
    pub subject: Option<String>,
    pub semester: Option<u8>,
    pub year: Option<i32>,
    pub exam_type: Option<ExamType>,
    pub status: Option<RoomStatus>,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        let c = &room.classification;
        self.subject
            .as_deref()
            .is_none_or(|s| c.subject.eq_ignore_ascii_case(s.trim()))
            && self.semester.is_none_or(|s| c.semester == s)
            && self.year.is_none_or(|y| c.year == y)
            && self.exam_type.is_none_or(|e| c.exam_type == e)
            && self.status.is_none_or(|s| room.status == s)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Partitioned {
    pub active: Vec<RoomListing>,
    pub ended: Vec<RoomListing>,
}

/// Splits a listing into active and ended rooms, keeping the order within each.
pub fn partition(listing: Vec<RoomListing>) -> Partitioned {
    let (active, ended) = listing
        .into_iter()
        .partition(|entry| entry.room.status.is_active());
    Partitioned { active, ended }
}

impl Rooms {
    /// Newest first, each with its committed message count.
    pub async fn list(&self, filter: &RoomFilter) -> CoreResult<Vec<RoomListing>> {
        Ok(db::fetch_room_listing(&self.db_pool)
            .await?
            .into_iter()
            .filter(|(room, _)| filter.matches(room))
            .map(|(room, message_count)| RoomListing { room, message_count })
            .collect())
    }

    pub async fn room(&self, room_id: Uuid) -> CoreResult<Room> {
        db::fetch_room(&self.db_pool, room_id)
            .await?
            .ok_or(CoreError::RoomNotFound(room_id))
    }

    /// Creates an Active room around an uploaded question-paper image.
    pub async fn create(&self, participant: &Participant, draft: &Draft, upload: Option<Upload>) -> CoreResult<Room> {
        policy::authorize_create(participant)?;

        let (title, classification) = draft.validate()?;
        let upload = require_upload(upload, "question paper image")?;
        if !upload.is_image() {
            return Err(CoreError::validation("question paper must be an image"));
        }

        let document_url = self.storage.store(upload).await?;
        let room = Room {
            id: Uuid::now_v7(),
            title,
            classification,
            created_by: participant.id,
            created_by_name: participant.display_name.clone(),
            status: RoomStatus::Active,
            document_url,
            created_at: now(),
            ended_at: None,
        };
        db::insert_room(&self.db_pool, &room).await?;
        self.register(room.clone());

        info!(room = %room.id, by = %participant.id, title = %room.title, "room created");
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classification;

    fn room(status: RoomStatus, semester: u8) -> Room {
        Room {
            id: Uuid::now_v7(),
            title: "t".into(),
            classification: Classification {
                subject: "Maths".into(),
                semester,
                year: 2024,
                exam_type: ExamType::Midterm,
            },
            created_by: Uuid::now_v7(),
            created_by_name: "c".into(),
            status,
            document_url: "/uploads/x.png".into(),
            created_at: now(),
            ended_at: None,
        }
    }

    #[test]
    fn filter_matches_on_every_given_field() {
        let r = room(RoomStatus::Active, 2);
        assert!(RoomFilter::default().matches(&r));

        let by_subject = RoomFilter {
            subject: Some("maths".into()),
            ..Default::default()
        };
        assert!(by_subject.matches(&r));

        let wrong_semester = RoomFilter {
            semester: Some(5),
            ..Default::default()
        };
        assert!(!wrong_semester.matches(&r));

        let ended_only = RoomFilter {
            status: Some(RoomStatus::Ended),
            ..Default::default()
        };
        assert!(!ended_only.matches(&r));
    }

    #[test]
    fn partition_keeps_order() {
        let listing: Vec<RoomListing> = [
            (RoomStatus::Active, 1),
            (RoomStatus::Ended, 2),
            (RoomStatus::Active, 3),
        ]
        .into_iter()
        .map(|(status, semester)| RoomListing {
            room: room(status, semester),
            message_count: 0,
        })
        .collect();

        let parts = partition(listing);
        let active: Vec<u8> = parts.active.iter().map(|e| e.room.classification.semester).collect();
        assert_eq!(active, vec![1, 3]);
        assert_eq!(parts.ended.len(), 1);
    }
}
