use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Which booking model a deployment runs. The two are alternatives and are
/// never evaluated together for the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookingDiscipline {
    /// Date + slot index (0-7) with a best-effort occupancy pre-check.
    #[default]
    DailySlot,
    /// Weekday + per-doctor capacity counter claimed by an atomic decrement.
    WeekdayCapacity,
}

impl FromStr for BookingDiscipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slot" | "daily_slot" | "a" => Ok(BookingDiscipline::DailySlot),
            "weekday" | "weekday_capacity" | "b" => Ok(BookingDiscipline::WeekdayCapacity),
            other => Err(format!("unknown booking discipline: {}", other)),
        }
    }
}

impl fmt::Display for BookingDiscipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingDiscipline::DailySlot => write!(f, "slot"),
            BookingDiscipline::WeekdayCapacity => write!(f, "weekday"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub booking_discipline: BookingDiscipline,
    /// Upper bound a doctor's weekday counter may be restored to on cancellation.
    pub weekday_capacity_max: i32,
    pub storage_timeout_secs: u64,
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
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            booking_discipline: env::var("BOOKING_DISCIPLINE")
                .ok()
                .and_then(|value| {
                    value.parse().map_err(|e: String| {
                        warn!("{}, falling back to slot booking", e);
                    }).ok()
                })
                .unwrap_or_default(),
            weekday_capacity_max: parse_or_default("WEEKDAY_CAPACITY_MAX", 8),
            storage_timeout_secs: parse_or_default("STORAGE_TIMEOUT_SECS", 10),
            port: parse_or_default("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_or_default<T: FromStr + fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_discipline_names() {
        assert_eq!("slot".parse::<BookingDiscipline>(), Ok(BookingDiscipline::DailySlot));
        assert_eq!(" Weekday ".parse::<BookingDiscipline>(), Ok(BookingDiscipline::WeekdayCapacity));
        assert!("hourly".parse::<BookingDiscipline>().is_err());
    }

    #[test]
    fn defaults_to_daily_slot() {
        assert_eq!(BookingDiscipline::default(), BookingDiscipline::DailySlot);
        assert_eq!(BookingDiscipline::WeekdayCapacity.to_string(), "weekday");
    }
}
