//! Author intake: first submission, code verification, further papers

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use validator::Validate;

use super::AccessCodeRequest;
use crate::AppState;
use papertrail_common::{
    auth::{validate_access_code, AuthContext, Role},
    db::models::{Author, Paper},
    db::{NewAuthor, NewPaper},
    errors::{AppError, Result},
    metrics,
};

/// Text fields and the single file part of a multipart upload
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<(String, Bytes)>,
}

impl UploadForm {
    /// Drain a multipart body; the part named `file` is the manuscript
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.file = Some((file_name, bytes));
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value.trim().to_string());
            }
        }

        Ok(form)
    }

    /// Required, non-blank text field
    pub fn take(&mut self, key: &str) -> Result<String> {
        self.fields
            .remove(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::MissingField {
                field: key.to_string(),
            })
    }

    pub fn take_file(&mut self) -> Result<(String, Bytes)> {
        self.file
            .take()
            .filter(|(name, bytes)| !name.is_empty() && !bytes.is_empty())
            .ok_or_else(|| AppError::MissingField {
                field: "file".to_string(),
            })
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation {
            message: err.body_text(),
            field: Some("file".to_string()),
        }
    } else {
        AppError::InvalidFormat {
            message: err.body_text(),
        }
    }
}

#[derive(Debug, Validate)]
struct AuthorFields {
    #[validate(length(max = 255))]
    name: String,
    #[validate(length(max = 255))]
    affiliation: String,
    #[validate(length(max = 20))]
    tel_no: String,
    #[validate(email)]
    email: String,
    #[validate(length(max = 255))]
    postal_address: String,
}

#[derive(Debug, Validate)]
struct PaperFields {
    #[validate(length(max = 255))]
    title: String,
    abstract_text: String,
    #[validate(length(max = 255))]
    keywords: String,
    #[validate(length(max = 50))]
    paper_type: String,
    submission_date: NaiveDate,
}

fn author_fields(form: &mut UploadForm) -> Result<AuthorFields> {
    let fields = AuthorFields {
        name: form.take("name")?,
        affiliation: form.take("affiliation")?,
        tel_no: form.take("tel_no")?,
        email: form.take("email")?,
        postal_address: form.take("postal_address")?,
    };
    fields.validate()?;
    Ok(fields)
}

fn paper_fields(form: &mut UploadForm) -> Result<PaperFields> {
    let date = form.take("submission_date")?;
    let fields = PaperFields {
        title: form.take("title")?,
        abstract_text: form.take("abstract")?,
        keywords: form.take("keywords")?,
        paper_type: form.take("paper_type")?,
        submission_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
            AppError::InvalidFormat {
                message: "submission_date must be YYYY-MM-DD".to_string(),
            }
        })?,
    };
    fields.validate()?;
    Ok(fields)
}

impl PaperFields {
    fn into_new_paper(self, file_name: String) -> NewPaper {
        NewPaper {
            title: self.title,
            abstract_text: self.abstract_text,
            keywords: self.keywords,
            paper_type: self.paper_type,
            submission_date: self.submission_date,
            file_name,
        }
    }
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    pub author: Author,
    pub paper: Paper,
    pub message: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub author_id: i32,
    pub name: String,
}

/// Register a new author together with their first paper
pub async fn create_submission(
    State(state): State<AppState>,
    auth: AuthContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionResponse>)> {
    auth.require_role(Role::Author)?;

    let mut form = UploadForm::read(multipart).await?;

    let access_code = form.take("access_code")?;
    validate_access_code(&access_code).map_err(|_| AppError::InvalidFormat {
        message: "Please enter a valid 5-digit PIN".to_string(),
    })?;

    let author = author_fields(&mut form)?;
    let paper = paper_fields(&mut form)?;
    let (original_name, bytes) = form.take_file()?;
    state.uploads.allowed_extension(&original_name)?;

    // Cheap pre-check so a reused PIN does not leave an orphaned upload
    if state.repo.find_author_by_code(&access_code).await?.is_some() {
        return Err(AppError::Duplicate {
            message: "This PIN is already in use. Please use a unique PIN for new author registration."
                .to_string(),
        });
    }

    let stored = state.uploads.store(&original_name, &bytes).await?;

    let (author, paper) = state
        .repo
        .create_author_with_paper(
            NewAuthor {
                name: author.name,
                affiliation: author.affiliation,
                tel_no: author.tel_no,
                email: author.email,
                postal_address: author.postal_address,
                access_code,
            },
            paper.into_new_paper(stored.file_name),
        )
        .await?;

    metrics::record_submission("new_author", stored.size);

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse {
            author,
            paper,
            message: "Paper submitted successfully".to_string(),
        }),
    ))
}

/// Confirm that an author exists for an access code
pub async fn verify_author(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<AccessCodeRequest>,
) -> Result<Json<VerifyResponse>> {
    auth.require_role(Role::Author)?;
    let code = request.code()?;

    let author = state
        .repo
        .find_author_by_code(code)
        .await?
        .ok_or_else(|| AppError::AuthorNotFound { code: code.to_string() })?;

    Ok(Json(VerifyResponse {
        author_id: author.id,
        name: author.name,
    }))
}

/// Submit an additional paper for an existing author
pub async fn add_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(access_code): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Paper>)> {
    auth.require_role(Role::Author)?;
    validate_access_code(&access_code)?;

    let author = state
        .repo
        .find_author_by_code(&access_code)
        .await?
        .ok_or_else(|| AppError::AuthorNotFound { code: access_code.clone() })?;

    let mut form = UploadForm::read(multipart).await?;
    let paper = paper_fields(&mut form)?;
    let (original_name, bytes) = form.take_file()?;

    let stored = state.uploads.store(&original_name, &bytes).await?;
    let paper = state
        .repo
        .create_paper_for_author(&author, paper.into_new_paper(stored.file_name))
        .await?;

    metrics::record_submission("additional", stored.size);
    tracing::info!(author_id = author.id, paper_id = paper.id, "Additional paper submitted");

    Ok((StatusCode::CREATED, Json(paper)))
}
