//! Category routes. Reads are public; writes need an admin token.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};

use haat_core::CategoryId;

use super::discard_on_error;
use crate::db::{CategoryRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput};
use crate::services::uploads::{FormFields, MAX_FORM_BYTES, UploadKind};
use crate::state::AppState;

/// Create the category routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search))
        .route("/bulk", delete(delete_many))
        .route("/{id}", put(update).delete(delete_one))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub message: &'static str,
    pub category: Category,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted: Vec<CategoryId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkDelete {
    #[serde(default)]
    pub ids: Vec<CategoryId>,
}

fn category_input(form: &FormFields, icon: Option<String>) -> Result<CategoryInput> {
    CategoryInput {
        name: form.text("name").unwrap_or_default().to_owned(),
        description: form.text("description").map(str::to_owned),
        icon,
    }
    .validate()
    .map_err(AppError::BadRequest)
}

fn category_not_found(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => AppError::NotFound("Category not found".to_string()),
        other => other.into(),
    }
}

/// GET /api/categories
async fn list(State(state): State<AppState>) -> Result<Json<CategoriesResponse>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// GET /api/categories/search?name=
async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<CategoriesResponse>> {
    let term = query
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Search term is required".to_string()))?;
    let categories = CategoryRepository::new(state.pool()).search(&term).await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// POST /api/categories (multipart, optional `icon` file)
async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CategoryResponse>)> {
    let uploads = state.uploads();
    let (form, stored) = uploads.read_form(multipart, UploadKind::CategoryIcon).await?;

    let result = async {
        let input = category_input(&form, stored.first().cloned())?;
        let category = CategoryRepository::new(state.pool()).create(&input).await?;
        Ok::<_, AppError>(category)
    }
    .await;

    let category = discard_on_error(uploads, &stored, result).await?;

    Ok((
        StatusCode::CREATED,
        Json(CategoryResponse {
            message: "Category created successfully",
            category,
        }),
    ))
}

/// PUT /api/categories/{id} (multipart)
///
/// Without a new icon file the current icon is kept.
async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
    multipart: Multipart,
) -> Result<Json<CategoryResponse>> {
    let uploads = state.uploads();
    let (form, stored) = uploads.read_form(multipart, UploadKind::CategoryIcon).await?;

    let result = async {
        let repo = CategoryRepository::new(state.pool());
        let previous = repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        let input = category_input(&form, stored.first().cloned())?;
        let category = repo.update(id, &input).await.map_err(category_not_found)?;
        Ok::<_, AppError>((previous, category))
    }
    .await;

    let (previous, category) = discard_on_error(uploads, &stored, result).await?;

    if let Some(old) = previous.icon
        && category.icon.as_deref() != Some(old.as_str())
    {
        uploads.remove(&old).await;
    }
    Ok(Json(CategoryResponse {
        message: "Category updated successfully",
        category,
    }))
}

/// DELETE /api/categories/{id}
async fn delete_one(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<Json<CategoryResponse>> {
    let category = CategoryRepository::new(state.pool())
        .delete(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    if let Some(icon) = &category.icon {
        state.uploads().remove(icon).await;
    }
    Ok(Json(CategoryResponse {
        message: "Category deleted successfully",
        category,
    }))
}

/// DELETE /api/categories/bulk with `{"ids": [...]}`
async fn delete_many(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(request): Json<BulkDelete>,
) -> Result<Json<BulkDeleteResponse>> {
    if request.ids.is_empty() {
        return Err(AppError::BadRequest(
            "No category ids provided".to_string(),
        ));
    }

    let deleted = CategoryRepository::new(state.pool())
        .delete_many(&request.ids)
        .await?;
    for icon in deleted.iter().filter_map(|c| c.icon.as_deref()) {
        state.uploads().remove(icon).await;
    }

    Ok(Json(BulkDeleteResponse {
        message: format!("{} categories deleted successfully", deleted.len()),
        deleted: deleted.into_iter().map(|c| c.id).collect(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use haat_core::Role;

    use super::*;
    use crate::routes::tests::{send, test_state, token_for};

    #[test]
    fn test_category_input_requires_name() {
        let form = FormFields::default();
        assert!(category_input(&form, None).is_err());

        let mut form = FormFields::default();
        form.push("name", " Handloom ");
        form.push("description", "   ");
        let input = category_input(&form, Some("/uploads/icon-1.png".to_owned())).unwrap();
        assert_eq!(input.name, "Handloom");
        assert_eq!(input.description, None);
        assert_eq!(input.icon.as_deref(), Some("/uploads/icon-1.png"));
    }

    #[tokio::test]
    async fn test_search_requires_term() {
        let (status, body) =
            send(test_state(), "GET", "/api/categories/search?name=%20", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Search term is required");
    }

    #[tokio::test]
    async fn test_bulk_delete_rejects_empty_list() {
        let state = test_state();
        let token = token_for(&state, Role::Admin, 1);
        let (status, _) = send(
            state,
            "DELETE",
            "/api/categories/bulk",
            Some(&token),
            Some(json!({"ids": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_writes_need_admin() {
        let state = test_state();
        let token = token_for(&state, Role::Seller, 1);
        let (status, _) = send(
            state,
            "DELETE",
            "/api/categories/4",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
