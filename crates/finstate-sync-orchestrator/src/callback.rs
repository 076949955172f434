//! Terminal status callback, per spec.md §4.5.6/§7: one retry with a short
//! fixed delay on transport failure; final failure is logged and swallowed,
//! never re-thrown.

use std::time::Duration;

use finstate_sync_core::CallbackPayload;
use reqwest::Client;
use tracing::{instrument, warn};

const CALLBACK_RETRY_DELAY: Duration = Duration::from_secs(2);

#[instrument(skip(http, payload), fields(ticker = %payload.ticker))]
pub async fn post_callback(http: &Client, callback_url: &str, bearer_secret: &str, payload: &CallbackPayload) {
    for attempt in 1..=2 {
        let result = http
            .post(callback_url)
            .bearer_auth(bearer_secret)
            .json(payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => return,
            Err(err) => {
                warn!(attempt, error = %err, "callback post failed");
                if attempt == 1 {
                    tokio::time::sleep(CALLBACK_RETRY_DELAY).await;
                }
            }
        }
    }
    warn!("callback delivery failed after retry, giving up");
}
