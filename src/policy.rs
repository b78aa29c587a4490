//! Who may do what. Pure predicates with no side effects; every mutating
//! path asks here instead of inspecting `Participant::eligible` itself.

use crate::{
    error::{CoreError, CoreResult},
    model::{Participant, RoomStatus},
};

/// Rooms and their history are public.
pub fn can_read(_status: RoomStatus) -> bool {
    true
}

pub fn can_create_room(participant: &Participant) -> bool {
    participant.eligible
}

pub fn can_upload_paper(participant: &Participant) -> bool {
    participant.eligible
}

pub fn can_post(participant: &Participant, status: RoomStatus) -> bool {
    participant.eligible && status.is_active()
}

/// Any eligible participant may close any room, not only its creator.
pub fn can_close(participant: &Participant, _status: RoomStatus) -> bool {
    participant.eligible
}

pub fn authorize_create(participant: &Participant) -> CoreResult<()> {
    if can_create_room(participant) {
        Ok(())
    } else {
        Err(CoreError::AccessDenied)
    }
}

/// An ended room reports `RoomClosed` rather than `AccessDenied`.
pub fn authorize_post(participant: &Participant, status: RoomStatus) -> CoreResult<()> {
    if can_post(participant, status) {
        Ok(())
    } else if !status.is_active() {
        Err(CoreError::RoomClosed)
    } else {
        Err(CoreError::AccessDenied)
    }
}

pub fn authorize_close(participant: &Participant, status: RoomStatus) -> CoreResult<()> {
    if can_close(participant, status) {
        Ok(())
    } else {
        Err(CoreError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn participant(eligible: bool) -> Participant {
        Participant {
            id: Uuid::now_v7(),
            display_name: "Test".into(),
            eligible,
        }
    }

    #[test]
    fn post_truth_table() {
        let statuses = [RoomStatus::Active, RoomStatus::Ended];
        for eligible in [true, false] {
            let p = participant(eligible);
            for status in statuses {
                assert_eq!(can_post(&p, status), eligible && status == RoomStatus::Active);
                assert!(can_read(status));
            }
        }
    }

    #[test]
    fn ineligible_cannot_create_or_close() {
        let p = participant(false);
        assert!(matches!(authorize_create(&p), Err(CoreError::AccessDenied)));
        assert!(matches!(authorize_close(&p, RoomStatus::Active), Err(CoreError::AccessDenied)));
        assert!(authorize_create(&participant(true)).is_ok());
    }

    #[test]
    fn ended_room_reports_closed() {
        let p = participant(true);
        assert!(matches!(authorize_post(&p, RoomStatus::Ended), Err(CoreError::RoomClosed)));
        assert!(matches!(
            authorize_post(&participant(false), RoomStatus::Active),
            Err(CoreError::AccessDenied)
        ));
        assert!(authorize_post(&p, RoomStatus::Active).is_ok());
    }
}
