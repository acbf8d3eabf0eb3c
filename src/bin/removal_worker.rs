//! Removal worker: soft-kicks expired subscribers out of their channels.

use plataforma_workers::consumer;
use plataforma_workers::logger::{self, LogTag};
use plataforma_workers::messages::queues;

#[tokio::main]
async fn main() {
    logger::init();
    if let Err(err) = consumer::run_worker("removal_worker", queues::USER_REMOVAL).await {
        logger::error(LogTag::System, &format!("removal_worker failed: {:#}", err));
        std::process::exit(1);
    }
}
