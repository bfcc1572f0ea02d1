//! Accident reports and sensibilization campaigns. Both are a PDF plus an
//! optional cover image; they differ only in collection and key prefix.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::form::{parse_date, UploadForm, UploadedFile};
use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::document_repository::{DocumentFilter, SafetyDocumentRepository};
use crate::db::models::{new_id, DocumentKind, SafetyDocument, TargetKind};
use crate::db::pagination::{Page, PageQuery};
use crate::error::AppError;
use crate::storage::client::{delete_all, presign_optional, sanitize_file_name, StorageClient};

#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    pub zone: Option<String>,
    /// Title substring.
    pub q: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub zone: Option<String>,
    /// Date string; see [`parse_date`].
    pub event_date: Option<String>,
}

/// A document with short-lived download links.
#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: SafetyDocument,
    pub pdf_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

pub async fn to_detail(
    storage: &dyn StorageClient,
    document: SafetyDocument,
    expires_in: std::time::Duration,
) -> DocumentDetail {
    let pdf_url = presign_optional(storage, Some(document.pdf_key.as_str()), expires_in).await;
    let thumbnail_url =
        presign_optional(storage, document.thumbnail_key.as_deref(), expires_in).await;
    DocumentDetail {
        document,
        pdf_url,
        thumbnail_url,
    }
}

fn is_pdf(file: &UploadedFile) -> bool {
    file.content_type == "application/pdf"
        || (file.content_type == "application/octet-stream"
            && file.file_name.to_lowercase().ends_with(".pdf"))
}

/// Store the uploaded PDF (and optional cover image) and record the document.
///
/// Objects go under `{prefix}/{id}/`. If the record can't be written the
/// uploaded objects are removed again.
pub async fn process_create_document(
    repo: &dyn SafetyDocumentRepository,
    storage: &dyn StorageClient,
    caller: &AuthenticatedUser,
    mut form: UploadForm,
) -> Result<SafetyDocument, AppError> {
    caller.require(Role::Supervisor)?;
    let kind = repo.kind();

    let title = form.required_text("title")?;
    let description = form.text("description").unwrap_or_default();
    let zone = form.text("zone");
    let event_date = form.text("event_date").map(|d| parse_date(&d)).transpose()?;

    let pdf = form
        .take_file("file")
        .ok_or_else(|| AppError::BadRequest("A PDF file is required in field 'file'".into()))?;
    if !is_pdf(&pdf) {
        return Err(AppError::BadRequest("Only PDF files are allowed".into()));
    }
    let thumbnail = form.take_file("thumbnail");
    if let Some(thumb) = &thumbnail {
        if !thumb.content_type.starts_with("image/") {
            return Err(AppError::BadRequest("Thumbnail must be an image".into()));
        }
    }

    let id = new_id();
    let prefix = format!("{}/{}", kind.key_prefix(), id);
    let pdf_key = format!("{}/{}", prefix, sanitize_file_name(&pdf.file_name));
    storage
        .put_object(&pdf_key, pdf.bytes, "application/pdf")
        .await?;
    let mut stored = vec![pdf_key.clone()];

    let thumbnail_key = match thumbnail {
        Some(thumb) => {
            let key = format!(
                "{}/thumbnail-{}",
                prefix,
                sanitize_file_name(&thumb.file_name)
            );
            if let Err(e) = storage
                .put_object(&key, thumb.bytes, &thumb.content_type)
                .await
            {
                delete_all(storage, &stored).await;
                return Err(e);
            }
            stored.push(key.clone());
            Some(key)
        }
        None => None,
    };

    let document = SafetyDocument {
        id,
        title,
        description,
        zone,
        pdf_key,
        thumbnail_key,
        event_date,
        uploaded_by: caller.user_id.clone(),
        created_at: Utc::now(),
    };

    if let Err(e) = repo.insert(document.clone()).await {
        delete_all(storage, &stored).await;
        return Err(e);
    }

    tracing::info!(kind = kind.label(), document_id = %document.id, "Document uploaded");
    Ok(document)
}

pub async fn process_update_document(
    repo: &dyn SafetyDocumentRepository,
    caller: &AuthenticatedUser,
    id: &str,
    request: UpdateDocumentRequest,
) -> Result<SafetyDocument, AppError> {
    caller.require(Role::Supervisor)?;

    let mut document = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} '{}' not found", repo.kind().label(), id)))?;

    if let Some(title) = request.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("Field 'title' is required".into()));
        }
        document.title = title.to_string();
    }
    if let Some(description) = request.description {
        document.description = description.trim().to_string();
    }
    if let Some(zone) = request.zone {
        let zone = zone.trim().to_string();
        document.zone = (!zone.is_empty()).then_some(zone);
    }
    if let Some(date) = request.event_date {
        document.event_date = if date.trim().is_empty() {
            None
        } else {
            Some(parse_date(&date)?)
        };
    }

    repo.update(document.clone()).await?;
    Ok(document)
}

/// Remove the record, its stored objects and its likes and comments.
pub async fn process_delete_document(
    state: &AppState,
    caller: &AuthenticatedUser,
    kind: DocumentKind,
    id: &str,
) -> Result<(), AppError> {
    caller.require(Role::Admin)?;
    let repo = state.documents(kind);

    let document = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} '{}' not found", kind.label(), id)))?;

    repo.delete(id).await?;

    let keys: Vec<String> = std::iter::once(document.pdf_key)
        .chain(document.thumbnail_key)
        .collect();
    delete_all(state.storage.as_ref(), &keys).await;
    state
        .interactions
        .purge_target(TargetKind::from(kind), id)
        .await?;

    tracing::info!(kind = kind.label(), document_id = %id, "Document deleted");
    Ok(())
}

async fn list(
    state: &AppState,
    kind: DocumentKind,
    query: DocumentQuery,
) -> Result<Page<DocumentDetail>, AppError> {
    let filter = DocumentFilter {
        zone: query.zone.filter(|z| !z.trim().is_empty()),
        title_contains: query.q,
    };
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let found = state.documents(kind).list(&filter, &page).await?;

    let expiry = state.presign_expiry();
    let mut items = Vec::with_capacity(found.items.len());
    for document in found.items {
        items.push(to_detail(state.storage.as_ref(), document, expiry).await);
    }

    Ok(Page {
        items,
        total: found.total,
        page: found.page,
        limit: found.limit,
        total_pages: found.total_pages,
    })
}

async fn create(
    state: &AppState,
    kind: DocumentKind,
    caller: &AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentDetail>), AppError> {
    // Reject before reading a large body.
    caller.require(Role::Supervisor)?;
    let form = UploadForm::read(multipart).await?;
    let document =
        process_create_document(state.documents(kind), state.storage.as_ref(), caller, form)
            .await?;
    let detail = to_detail(state.storage.as_ref(), document, state.presign_expiry()).await;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get(state: &AppState, kind: DocumentKind, id: &str) -> Result<Json<DocumentDetail>, AppError> {
    let document = state
        .documents(kind)
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} '{}' not found", kind.label(), id)))?;
    Ok(Json(
        to_detail(state.storage.as_ref(), document, state.presign_expiry()).await,
    ))
}

async fn update(
    state: &AppState,
    kind: DocumentKind,
    caller: &AuthenticatedUser,
    id: &str,
    request: UpdateDocumentRequest,
) -> Result<Json<DocumentDetail>, AppError> {
    let document = process_update_document(state.documents(kind), caller, id, request).await?;
    Ok(Json(
        to_detail(state.storage.as_ref(), document, state.presign_expiry()).await,
    ))
}

// -- Accidents --

/// `GET /api/accidents`
pub async fn list_accidents_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Page<DocumentDetail>>, AppError> {
    Ok(Json(list(&state, DocumentKind::Accident, query).await?))
}

/// `POST /api/accidents` (supervisor+), multipart.
pub async fn create_accident_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentDetail>), AppError> {
    create(&state, DocumentKind::Accident, &caller, multipart).await
}

/// `GET /api/accidents/{id}`
pub async fn get_accident_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, AppError> {
    get(&state, DocumentKind::Accident, &id).await
}

/// `PUT /api/accidents/{id}` (supervisor+)
pub async fn update_accident_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentDetail>, AppError> {
    update(&state, DocumentKind::Accident, &caller, &id, request).await
}

/// `DELETE /api/accidents/{id}` (admin)
pub async fn delete_accident_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    process_delete_document(&state, &caller, DocumentKind::Accident, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Sensibilizations --

/// `GET /api/sensibilizations`
pub async fn list_sensibilizations_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Page<DocumentDetail>>, AppError> {
    Ok(Json(list(&state, DocumentKind::Sensibilization, query).await?))
}

/// `POST /api/sensibilizations` (supervisor+), multipart.
pub async fn create_sensibilization_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentDetail>), AppError> {
    create(&state, DocumentKind::Sensibilization, &caller, multipart).await
}

/// `GET /api/sensibilizations/{id}`
pub async fn get_sensibilization_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, AppError> {
    get(&state, DocumentKind::Sensibilization, &id).await
}

/// `PUT /api/sensibilizations/{id}` (supervisor+)
pub async fn update_sensibilization_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentDetail>, AppError> {
    update(&state, DocumentKind::Sensibilization, &caller, &id, request).await
}

/// `DELETE /api/sensibilizations/{id}` (admin)
pub async fn delete_sensibilization_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    process_delete_document(&state, &caller, DocumentKind::Sensibilization, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
