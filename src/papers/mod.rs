mod list;
mod upload;

use axum::{
    Router,
    routing::{get, post},
};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState, db,
    error::{CoreError, CoreResult},
    model::{Draft, Paper, Participant, now},
    policy,
    storage::{DocumentStorage, Upload, require_upload},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::papers))
        .route("/upload", post(upload::upload))
}

/// Archives a question paper. Unlike room attachments these must be PDFs.
pub async fn upload_paper(
    db_pool: &SqlitePool,
    storage: &dyn DocumentStorage,
    participant: &Participant,
    draft: &Draft,
    upload: Option<Upload>,
) -> CoreResult<Paper> {
    if !policy::can_upload_paper(participant) {
        return Err(CoreError::AccessDenied);
    }

    let (title, classification) = draft.validate()?;
    let upload = require_upload(upload, "PDF file")?;
    if !upload.is_pdf() {
        return Err(CoreError::validation("paper must be a PDF"));
    }

    let paper = Paper {
        id: Uuid::now_v7(),
        title,
        classification,
        file_url: storage.store(upload).await?,
        uploaded_by: participant.id,
        uploaded_by_name: participant.display_name.clone(),
        created_at: now(),
    };
    db::insert_paper(db_pool, &paper).await?;

    info!(paper = %paper.id, by = %participant.id, "paper uploaded");
    Ok(paper)
}

pub async fn list_papers(db_pool: &SqlitePool, semester: Option<u8>) -> CoreResult<Vec<Paper>> {
    Ok(db::fetch_papers(db_pool, semester).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskStorage;

    fn draft(semester: &str) -> Draft {
        Draft {
            title: Some("OS midsem".into()),
            subject: Some("OS".into()),
            semester: Some(semester.into()),
            year: Some("2023".into()),
            exam_type: Some("midsem".into()),
        }
    }

    fn pdf() -> Upload {
        Upload {
            file_name: "os.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    fn participant(eligible: bool) -> Participant {
        Participant {
            id: Uuid::now_v7(),
            display_name: "P".into(),
            eligible,
        }
    }

    #[tokio::test]
    async fn upload_and_filter_by_semester() {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path(), "/uploads");
        let p = participant(true);

        upload_paper(&pool, &storage, &p, &draft("4"), Some(pdf())).await.unwrap();
        upload_paper(&pool, &storage, &p, &draft("5"), Some(pdf())).await.unwrap();

        assert_eq!(list_papers(&pool, None).await.unwrap().len(), 2);
        let fifth = list_papers(&pool, Some(5)).await.unwrap();
        assert_eq!(fifth.len(), 1);
        assert_eq!(fifth[0].classification.semester, 5);
        assert!(fifth[0].file_url.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn images_and_outsiders_are_rejected() {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path(), "/uploads");

        let image = Upload {
            content_type: "image/png".into(),
            ..pdf()
        };
        let res = upload_paper(&pool, &storage, &participant(true), &draft("4"), Some(image)).await;
        assert!(matches!(res, Err(CoreError::Validation(_))));

        let res = upload_paper(&pool, &storage, &participant(false), &draft("4"), Some(pdf())).await;
        assert!(matches!(res, Err(CoreError::AccessDenied)));
        assert!(list_papers(&pool, None).await.unwrap().is_empty());
    }
}
