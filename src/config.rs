use anyhow::Context;

/// Upper bound on `JWT_TTL_DAYS`.
pub const MAX_JWT_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

/// Argon2id cost parameters used when hashing new passwords.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
    pub folder: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so parsing can be exercised
    /// without mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} is not set"));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: or_default("JWT_ISSUER", "carlot"),
            audience: or_default("JWT_AUDIENCE", "carlot-users"),
            ttl_days: parse_or(&lookup, "JWT_TTL_DAYS", 30)?,
        };
        if !(1..=MAX_JWT_TTL_DAYS).contains(&jwt.ttl_days) {
            anyhow::bail!(
                "JWT_TTL_DAYS must be between 1 and {MAX_JWT_TTL_DAYS}, got {}",
                jwt.ttl_days
            );
        }

        let password = PasswordConfig {
            memory_kib: parse_or(&lookup, "ARGON2_MEMORY_KIB", argon2::Params::DEFAULT_M_COST)?,
            iterations: parse_or(&lookup, "ARGON2_ITERATIONS", argon2::Params::DEFAULT_T_COST)?,
            parallelism: parse_or(&lookup, "ARGON2_PARALLELISM", argon2::Params::DEFAULT_P_COST)?,
        };

        let endpoint = required("S3_ENDPOINT")?;
        let bucket = required("S3_BUCKET")?;
        let public_url = lookup("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
        let media = MediaConfig {
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
            region: or_default("S3_REGION", "us-east-1"),
            folder: or_default("MEDIA_FOLDER", "car_management"),
            public_url,
            endpoint,
            bucket,
        };

        Ok(Self {
            host: or_default("APP_HOST", "0.0.0.0"),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            jwt,
            password,
            media,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/carlot"),
            ("JWT_SECRET", "s3cret"),
            ("S3_ENDPOINT", "http://minio:9000/"),
            ("S3_BUCKET", "cars"),
            ("S3_ACCESS_KEY", "minio"),
            ("S3_SECRET_KEY", "minio123"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> anyhow::Result<AppConfig> {
        AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = load(&base_env()).expect("config should load");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.jwt.ttl_days, 30);
        assert_eq!(cfg.jwt.issuer, "carlot");
        assert_eq!(cfg.password.memory_kib, argon2::Params::DEFAULT_M_COST);
        assert_eq!(cfg.media.region, "us-east-1");
        assert_eq!(cfg.media.folder, "car_management");
        assert_eq!(cfg.media.public_url, "http://minio:9000/cars");
    }

    #[test]
    fn overrides_are_parsed() {
        let mut env = base_env();
        env.insert("APP_PORT", "9090");
        env.insert("JWT_TTL_DAYS", "7");
        env.insert("ARGON2_ITERATIONS", "4");
        env.insert("MEDIA_PUBLIC_URL", "https://cdn.example.com");
        let cfg = load(&env).expect("config should load");
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.jwt.ttl_days, 7);
        assert_eq!(cfg.password.iterations, 4);
        assert_eq!(cfg.media.public_url, "https://cdn.example.com");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let mut env = base_env();
        env.remove("JWT_SECRET");
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn out_of_range_token_ttl_is_an_error() {
        for raw in ["0", "-5", "3651", "9223372036854775807"] {
            let mut env = base_env();
            env.insert("JWT_TTL_DAYS", raw);
            let err = load(&env).unwrap_err();
            assert!(err.to_string().contains("JWT_TTL_DAYS"), "{raw}: {err}");
        }

        let mut env = base_env();
        env.insert("JWT_TTL_DAYS", "3650");
        assert_eq!(load(&env).expect("max ttl").jwt.ttl_days, MAX_JWT_TTL_DAYS);
    }

    #[test]
    fn malformed_number_is_an_error() {
        let mut env = base_env();
        env.insert("APP_PORT", "eighty");
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }
}
