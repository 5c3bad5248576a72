//! Seed the catalog from a YAML file.
//!
//! Images must already be hosted (e.g. on Cloudinary); only their HTTPS URLs
//! are stored. Products go through the same validation as the seller's
//! add-product form.
//!
//! ```yaml
//! products:
//!   - name: Organic Bananas
//!     category: Fruits
//!     price: 1.20
//!     offerPrice: 0.99
//!     description:
//!       - Rich in potassium
//!       - Sold per bunch
//!     images:
//!       - https://res.cloudinary.com/demo/image/upload/bananas.png
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use greencart_storefront::db::ProductRepository;
use greencart_storefront::models::product::{Description, NewProduct, ProductData};
use greencart_storefront::services::validation::validate_product;

use super::{CommandError, connect};

/// Top-level layout of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<SeedProduct>,
}

/// One product entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: Description,
    pub category: String,
    pub price: Decimal,
    pub offer_price: Decimal,
    pub images: Vec<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

const fn default_in_stock() -> bool {
    true
}

impl SeedProduct {
    /// Validate into an insertable product.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Invalid` naming the product when validation fails.
    pub fn into_new_product(self) -> Result<(NewProduct, bool), CommandError> {
        let name = self.name.clone();
        if let Some(url) = self.images.iter().find(|url| !url.starts_with("https://")) {
            return Err(CommandError::Invalid(format!(
                "{name}: image URL must use https: {url}"
            )));
        }

        let data = ProductData {
            name: self.name,
            description: self.description,
            category: self.category,
            price: self.price,
            offer_price: self.offer_price,
        };
        let product = validate_product(data, self.images)
            .map_err(|e| CommandError::Invalid(format!("{name}: {e}")))?;
        Ok((product, self.in_stock))
    }
}

/// Parse and validate every product in a seed file before touching the database.
///
/// # Errors
///
/// Returns the first parse or validation failure.
pub fn parse_seed_file(content: &str) -> Result<Vec<(NewProduct, bool)>, CommandError> {
    let file: SeedFile = serde_yaml::from_str(content)?;
    file.products
        .into_iter()
        .map(SeedProduct::into_new_product)
        .collect()
}

/// Insert products from `file_path`. Names already in the catalog are skipped
/// unless `allow_duplicates` is set.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or a database
/// operation fails.
pub async fn products(file_path: &str, allow_duplicates: bool) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading products from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_string(),
            source,
        })?;
    let products = parse_seed_file(&content)?;
    info!(products = products.len(), "Seed file validated");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    let mut existing: HashSet<String> = repo
        .list()
        .await?
        .into_iter()
        .map(|product| product.name.to_lowercase())
        .collect();

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;

    for (product, in_stock) in products {
        let key = product.name.to_lowercase();
        if !allow_duplicates && existing.contains(&key) {
            warn!(name = %product.name, "Product already exists, skipping");
            skipped += 1;
            continue;
        }

        let created = repo.create(&product).await?;
        if !in_stock {
            repo.set_in_stock(created.id, false).await?;
        }
        existing.insert(key);
        inserted += 1;
        info!(id = %created.id, name = %created.name, "Inserted product");
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");
    Ok(())
}
