use common::model::config::RedisConfig;

pub fn create_redis_pool(config: &RedisConfig) -> Option<deadpool_redis::Pool> {
    let cfg = deadpool_redis::Config {
        connection: Some(deadpool_redis::ConnectionInfo {
            addr: deadpool_redis::ConnectionAddr::Tcp(config.redis_host.clone(), config.redis_port),
            redis: deadpool_redis::RedisConnectionInfo {
                db: config.redis_db as i64,
                username: config.redis_username.clone(),
                password: config.redis_password.clone(),
                protocol: deadpool_redis::ProtocolVersion::RESP2,
            },
        }),
        pool: Some(deadpool_redis::PoolConfig {
            max_size: config.pool_size.unwrap_or(100),
            ..Default::default()
        }),
        ..Default::default()
    };
    cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1)).ok()
}

/// Pool from a `redis://` URL, used by tests that run against a live server.
pub fn create_redis_pool_from_url(url: &str) -> Option<deadpool_redis::Pool> {
    let cfg = deadpool_redis::Config::from_url(url);
    cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1)).ok()
}
