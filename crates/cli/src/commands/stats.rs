//! Print catalog and order counts.

use tracing::info;

use greencart_storefront::db::AnalyticsRepository;

use super::{CommandError, connect};

/// Show all-time store statistics.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;
    let summary = AnalyticsRepository::new(&pool).summary(None).await?;

    info!("GreenCart Statistics");
    info!("====================");
    info!("Products: {}", summary.total_products);
    info!("  Out of stock: {}", summary.out_of_stock_products);
    info!("Registered users: {}", summary.registered_users);
    info!("Placed orders: {}", summary.orders);
    info!("  Paid online: {}", summary.paid_online_orders);
    info!("Revenue: {}", summary.revenue);
    info!("Average order value: {}", summary.average_order_value);
    Ok(())
}
