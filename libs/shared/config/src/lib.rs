use std::env;

use tracing::warn;

pub use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Zone in which calendar days and slot start times are evaluated.
    pub clinic_timezone: Tz,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            clinic_timezone: env::var("CLINIC_TIMEZONE")
                .ok()
                .and_then(|name| parse_timezone(&name))
                .unwrap_or_else(|| {
                    warn!("CLINIC_TIMEZONE not set or invalid, using UTC");
                    Tz::UTC
                }),
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn parse_timezone(name: &str) -> Option<Tz> {
    match name.trim().parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(e) => {
            warn!("Unknown timezone '{}': {}", name, e);
            None
        }
    }
}
