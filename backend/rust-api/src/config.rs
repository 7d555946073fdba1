use chrono_tz::Tz;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::services::game_service::GameTtls;

const DEFAULT_DAILY_TIMEZONE: Tz = Tz::America__Chicago;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub bind_addr: String,
    /// IANA zone whose calendar decides "today" for the daily question and leaderboards.
    pub daily_timezone: Tz,
    /// Candidate pool size fetched before shuffling.
    pub question_pool_limit: i64,
    pub auto_advance_delay_ms: u64,
    pub leaderboard_limit: usize,
    /// Unfinished games with no activity for this long are dropped.
    pub idle_game_ttl_secs: u64,
    /// Finished games stay readable this long after completion.
    pub finished_game_ttl_secs: u64,
    pub game_sweep_interval_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then a local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides (prefix: APP_)
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                format!("redis://{}:{}/0", host, port)
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "smarter_poker".to_string());

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let daily_timezone = settings
            .get_string("trivia.daily_timezone")
            .or_else(|_| env::var("DAILY_TIMEZONE"))
            .ok()
            .and_then(|name| match name.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(e) => {
                    tracing::warn!("Ignoring DAILY_TIMEZONE={}: {}", name, e);
                    None
                }
            })
            .unwrap_or(DEFAULT_DAILY_TIMEZONE);

        let question_pool_limit = settings
            .get_int("trivia.question_pool_limit")
            .ok()
            .or_else(|| env_number("QUESTION_POOL_LIMIT"))
            .filter(|v| *v > 0)
            .unwrap_or(50);

        let auto_advance_delay_ms = settings
            .get_int("trivia.auto_advance_delay_ms")
            .ok()
            .or_else(|| env_number("AUTO_ADVANCE_DELAY_MS"))
            .filter(|v| *v >= 0)
            .map(|v| v as u64)
            .unwrap_or(800);

        let leaderboard_limit = settings
            .get_int("trivia.leaderboard_limit")
            .ok()
            .or_else(|| env_number("LEADERBOARD_LIMIT"))
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .unwrap_or(10);

        let idle_game_ttl_secs = positive_secs(&settings, "trivia.idle_game_ttl_secs", "IDLE_GAME_TTL_SECS", 30 * 60);
        let finished_game_ttl_secs =
            positive_secs(&settings, "trivia.finished_game_ttl_secs", "FINISHED_GAME_TTL_SECS", 10 * 60);
        let game_sweep_interval_secs =
            positive_secs(&settings, "trivia.game_sweep_interval_secs", "GAME_SWEEP_INTERVAL_SECS", 60);

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            bind_addr,
            daily_timezone,
            question_pool_limit,
            auto_advance_delay_ms,
            leaderboard_limit,
            idle_game_ttl_secs,
            finished_game_ttl_secs,
            game_sweep_interval_secs,
        })
    }

    pub fn game_ttls(&self) -> GameTtls {
        GameTtls {
            idle: Duration::from_secs(self.idle_game_ttl_secs),
            finished: Duration::from_secs(self.finished_game_ttl_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            redis_uri: "redis://127.0.0.1:6379/0".to_string(),
            mongo_database: "smarter_poker".to_string(),
            bind_addr: "0.0.0.0:8081".to_string(),
            daily_timezone: DEFAULT_DAILY_TIMEZONE,
            question_pool_limit: 50,
            auto_advance_delay_ms: 800,
            leaderboard_limit: 10,
            idle_game_ttl_secs: 30 * 60,
            finished_game_ttl_secs: 10 * 60,
            game_sweep_interval_secs: 60,
        }
    }
}

fn env_number(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}

fn positive_secs(settings: &config::Config, key: &str, env_key: &str, default: u64) -> u64 {
    settings
        .get_int(key)
        .ok()
        .or_else(|| env_number(env_key))
        .filter(|v| *v > 0)
        .map(|v| v as u64)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_overrides_trivia_settings() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("AUTO_ADVANCE_DELAY_MS", "250");
        env::set_var("LEADERBOARD_LIMIT", "25");

        let config = Config::load().unwrap();
        assert_eq!(config.auto_advance_delay_ms, 250);
        assert_eq!(config.leaderboard_limit, 25);

        env::remove_var("AUTO_ADVANCE_DELAY_MS");
        env::remove_var("LEADERBOARD_LIMIT");
        env::remove_var("SKIP_ROOT_ENV");
    }

    #[test]
    #[serial]
    fn invalid_values_fall_back_to_defaults() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("QUESTION_POOL_LIMIT", "-3");

        let config = Config::load().unwrap();
        assert_eq!(config.question_pool_limit, 50);

        env::remove_var("QUESTION_POOL_LIMIT");
        env::remove_var("SKIP_ROOT_ENV");
    }

    #[test]
    #[serial]
    fn daily_timezone_is_read_by_iana_name() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("DAILY_TIMEZONE", "Europe/Berlin");
        assert_eq!(Config::load().unwrap().daily_timezone, Tz::Europe__Berlin);

        env::set_var("DAILY_TIMEZONE", "Central Standard Time");
        assert_eq!(Config::load().unwrap().daily_timezone, Tz::America__Chicago);

        env::remove_var("DAILY_TIMEZONE");
        env::remove_var("SKIP_ROOT_ENV");
    }

    #[test]
    fn defaults_follow_chicago_and_evict_stale_games() {
        let config = Config::default();
        assert_eq!(config.daily_timezone, Tz::America__Chicago);

        let ttls = config.game_ttls();
        assert_eq!(ttls.idle, Duration::from_secs(1800));
        assert_eq!(ttls.finished, Duration::from_secs(600));
    }
}
