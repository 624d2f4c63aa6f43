use std::env;

#[derive(Clone)]
pub struct ServerConfig {
    /// Seconds between notification sweep passes.
    pub sweep_interval_secs: u64,
    /// Webhook URL seeded into the demo user's settings, if any.
    pub webhook_url: Option<String>,
    pub webhook_name: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        let sweep_interval_secs = match env::var("SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| "SWEEP_INTERVAL_SECS must be a number of seconds".to_string())?,
            Err(_) => 60,
        };

        let webhook_url = env::var("DISCORD_WEBHOOK_URL").ok();

        let webhook_name =
            env::var("WEBHOOK_NAME").unwrap_or_else(|_| "PointFarm".to_string());

        Ok(ServerConfig {
            sweep_interval_secs,
            webhook_url,
            webhook_name,
        })
    }
}
