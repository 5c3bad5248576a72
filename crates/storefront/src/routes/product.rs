//! Product catalog route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use greencart_core::ProductId;

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::RequireSeller;
use crate::models::{Product, ProductData};
use crate::routes::{JsonBody, MessageResponse, MultipartForm};
use crate::services::cloudinary::{ImageUpload, MAX_IMAGE_BYTES};
use crate::services::validation::{
    MAX_PRODUCT_IMAGES, check_product_data, validate_image_count, validate_product,
};
use crate::state::AppState;

/// Multipart field carrying the product JSON.
const PRODUCT_DATA_FIELD: &str = "productData";

/// Multipart field carrying image files (repeated).
const IMAGES_FIELD: &str = "images";

/// Body limit for the add-product form: every image plus room for the JSON part.
const ADD_PRODUCT_BODY_LIMIT: usize = MAX_PRODUCT_IMAGES * MAX_IMAGE_BYTES + 1024 * 1024;

/// Build the product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/add",
            post(add).layer(DefaultBodyLimit::max(ADD_PRODUCT_BODY_LIMIT)),
        )
        .route("/list", get(list))
        .route("/id", post(by_id))
        .route("/stock", post(set_stock))
}

/// `{id}` body.
#[derive(Debug, Deserialize)]
pub struct ProductIdRequest {
    #[serde(deserialize_with = "crate::models::deserialize_id")]
    pub id: ProductId,
}

/// `{id, inStock}` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
    #[serde(deserialize_with = "crate::models::deserialize_id")]
    pub id: ProductId,
    pub in_stock: bool,
}

/// `{success, product}` response.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub success: bool,
    pub product: Product,
}

/// `{success, message, product}` response.
#[derive(Debug, Serialize)]
pub struct ProductAddedResponse {
    pub success: bool,
    pub message: &'static str,
    pub product: Product,
}

/// `{success, products}` response.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub success: bool,
    pub products: Arc<Vec<Product>>,
}

/// The add-product form after reading every part.
struct ProductForm {
    data: ProductData,
    images: Vec<ImageUpload>,
}

async fn read_product_form(mut multipart: Multipart) -> Result<ProductForm, AppError> {
    let mut data = None;
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(PRODUCT_DATA_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                let parsed: ProductData = serde_json::from_str(&text)
                    .map_err(|e| AppError::BadRequest(format!("Invalid productData: {e}")))?;
                data = Some(parsed);
            }
            Some(IMAGES_FIELD) => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                images.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("productData is required".to_string()))?;
    Ok(ProductForm { data, images })
}

/// Add a product with its images.
///
/// POST /api/product/add
#[instrument(skip(state, _seller, multipart))]
pub async fn add(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
    MultipartForm(multipart): MultipartForm,
) -> Result<(StatusCode, Json<ProductAddedResponse>), AppError> {
    let form = read_product_form(multipart).await?;

    // Reject bad forms before anything reaches the CDN
    check_product_data(&form.data)?;
    validate_image_count(form.images.len())?;
    for image in &form.images {
        image.validate()?;
    }

    let mut urls = Vec::with_capacity(form.images.len());
    for image in form.images {
        urls.push(state.cloudinary().upload_image(image).await?);
    }

    let new_product = validate_product(form.data, urls)?;
    let product = ProductRepository::new(state.pool())
        .create(&new_product)
        .await?;
    state.product_cache().invalidate().await;

    tracing::info!(product_id = %product.id, name = %product.name, "Product added");

    Ok((
        StatusCode::CREATED,
        Json(ProductAddedResponse {
            success: true,
            message: "Product Added",
            product,
        }),
    ))
}

/// All products, newest first.
///
/// GET /api/product/list
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<ProductListResponse>, AppError> {
    let repo = ProductRepository::new(state.pool());
    let products = state.product_cache().get_or_load(|| repo.list()).await?;

    Ok(Json(ProductListResponse {
        success: true,
        products,
    }))
}

/// One product by ID.
///
/// POST /api/product/id
#[instrument(skip(state))]
pub async fn by_id(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ProductIdRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(body.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}

/// Mark a product in or out of stock.
///
/// POST /api/product/stock
#[instrument(skip(state, _seller))]
pub async fn set_stock(
    State(state): State<AppState>,
    RequireSeller(_seller): RequireSeller,
    JsonBody(body): JsonBody<StockRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    ProductRepository::new(state.pool())
        .set_in_stock(body.id, body.in_stock)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound("Product not found".to_string())
            }
            other => other.into(),
        })?;
    state.product_cache().invalidate().await;

    Ok(MessageResponse::ok("Stock Updated"))
}
