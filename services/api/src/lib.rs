mod analyze;
mod cli;
mod infra;
mod routes;
mod server;

use retail_dss::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
