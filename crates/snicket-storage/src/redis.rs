use async_trait::async_trait;
use jiff::SignedDuration;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use snicket_core::error::Result;
use snicket_core::{DomainStat, Store, StoreError};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const URL_PREFIX: &str = "url:";
const CODE_PREFIX: &str = "code:";
const DOMAIN_PREFIX: &str = "domain_hits:";

/// Performs the three writes of a save as one atomic step on the server.
///
/// `KEYS[1]` = `url:<url>`, `KEYS[2]` = `code:<code>`,
/// `KEYS[3]` = `domain_hits:<domain>`; `ARGV[1]` = url, `ARGV[2]` = code,
/// `ARGV[3]` = TTL in seconds. Returns 1 when a record was written, 0 when
/// a live record already existed. The counter is stored as 8 bytes
/// big-endian and carries no TTL.
const SAVE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
local hits = redis.call('GET', KEYS[3])
local count = 0
if hits then
  count = struct.unpack('>I8', hits)
end
redis.call('SET', KEYS[3], struct.pack('>I8', count + 1))
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
redis.call('SET', KEYS[2], ARGV[1], 'EX', ARGV[3])
return 1
"#;

/// Redis-backed implementation of [`Store`].
///
/// Records live as two plain string keys with a native TTL, so expiry is
/// handled entirely by the server and an existing key is by definition a
/// live record. Domain counters are plain keys without a TTL.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    expiry: SignedDuration,
    save_script: Arc<Script>,
}

impl RedisStore {
    /// Connects to the Redis server at `url`, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str, expiry: SignedDuration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("connected to redis");
        Ok(Self::with_connection(conn, expiry))
    }

    /// Wraps an already established multiplexed connection.
    pub fn with_connection(conn: MultiplexedConnection, expiry: SignedDuration) -> Self {
        Self {
            conn,
            expiry,
            save_script: Arc::new(Script::new(SAVE_SCRIPT)),
        }
    }

    fn ttl_secs(&self) -> i64 {
        // SET .. EX rejects 0, so sub-second expiries round up to a second.
        let mut secs = self.expiry.as_secs();
        if self.expiry.subsec_nanos() > 0 {
            secs += 1;
        }
        secs.max(1)
    }
}

fn url_key(url: &str) -> String {
    format!("{}{}", URL_PREFIX, url)
}

fn code_key(code: &str) -> String {
    format!("{}{}", CODE_PREFIX, code)
}

fn domain_key(domain: &str) -> String {
    format!("{}{}", DOMAIN_PREFIX, domain)
}

fn decode_hits(raw: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = raw.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

#[async_trait]
impl Store for RedisStore {
    async fn code_exists(&self, code: &str) -> Result<bool> {
        if code.is_empty() {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        match conn.exists::<_, bool>(code_key(code)).await {
            Ok(exists) => Ok(exists),
            Err(e) => {
                warn!(code, error = %e, "redis error on exists");
                Err(StoreError::Operation(e.to_string()))
            }
        }
    }

    async fn get_code(&self, url: &str) -> Result<Option<String>> {
        if url.is_empty() {
            return Ok(None);
        }
        trace!(url, "looking up code in redis");
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(url_key(url)).await {
            Ok(code) => Ok(code),
            Err(e) => {
                warn!(url, error = %e, "redis error on get");
                Err(StoreError::Operation(e.to_string()))
            }
        }
    }

    async fn get_url(&self, code: &str) -> Result<Option<String>> {
        if code.is_empty() {
            return Ok(None);
        }
        trace!(code, "looking up url in redis");
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(code_key(code)).await {
            Ok(url) => Ok(url),
            Err(e) => {
                warn!(code, error = %e, "redis error on get");
                Err(StoreError::Operation(e.to_string()))
            }
        }
    }

    async fn save(&self, url: &str, code: &str, domain: &str) -> Result<()> {
        if url.is_empty() || code.is_empty() || domain.is_empty() {
            trace!(url, code, domain, "ignoring save with an empty field");
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let written: i64 = self
            .save_script
            .key(url_key(url))
            .key(code_key(code))
            .key(domain_key(domain))
            .arg(url)
            .arg(code)
            .arg(self.ttl_secs())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(url, code, error = %e, "redis error on save");
                StoreError::Operation(e.to_string())
            })?;

        if written == 1 {
            debug!(url, code, domain, "stored new shortening");
        } else {
            trace!(url, "url already has a live record");
        }
        Ok(())
    }

    async fn top_domains(&self, n: usize) -> Result<Vec<DomainStat>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", DOMAIN_PREFIX);

        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    warn!(error = %e, "redis error on scan");
                    StoreError::Operation(e.to_string())
                })?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        // SCAN may hand out the same key twice while the table is rehashing.
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<Vec<u8>>> = conn.mget(&keys).await.map_err(|e| {
            warn!(error = %e, "redis error on mget");
            StoreError::Operation(e.to_string())
        })?;

        let mut counts: Vec<(String, u64)> = Vec::with_capacity(keys.len());
        for (key, value) in keys.into_iter().zip(values) {
            let Some(domain) = key.strip_prefix(DOMAIN_PREFIX) else {
                continue;
            };
            let Some(bytes) = value else {
                // The key vanished between SCAN and MGET.
                continue;
            };
            match decode_hits(&bytes) {
                Some(hits) => counts.push((domain.to_string(), hits)),
                None => {
                    // A stray counter must not take the whole ranking down;
                    // skip it and keep the decodable ones.
                    warn!(domain, len = bytes.len(), "skipping domain counter with an invalid payload");
                    continue;
                }
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(n);
        Ok(counts
            .into_iter()
            .zip(1u32..)
            .map(|((domain, shortened), rank)| DomainStat {
                rank,
                domain,
                shortened,
            })
            .collect())
    }

    async fn purge(&self) -> Result<()> {
        // Redis evicts expired keys on its own; MEMORY PURGE only nudges the
        // allocator to hand freed pages back. Not every deployment permits
        // the command, so a refusal is logged and swallowed.
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> =
            redis::cmd("MEMORY").arg("PURGE").query_async(&mut conn).await;
        if let Err(e) = result {
            warn!(error = %e, "redis memory purge failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_hits_reads_big_endian() {
        assert_eq!(decode_hits(&[0, 0, 0, 0, 0, 0, 0, 1]), Some(1));
        assert_eq!(decode_hits(&[0, 0, 0, 0, 0, 0, 1, 0]), Some(256));
        assert_eq!(decode_hits(&1234u64.to_be_bytes()), Some(1234));
    }

    #[test]
    fn decode_hits_rejects_wrong_lengths() {
        assert_eq!(decode_hits(&[]), None);
        assert_eq!(decode_hits(&[1, 2, 3]), None);
        assert_eq!(decode_hits(&[0; 9]), None);
    }

    #[test]
    fn keys_follow_the_layout() {
        assert_eq!(url_key("http://example.com/a"), "url:http://example.com/a");
        assert_eq!(code_key("abc1234"), "code:abc1234");
        assert_eq!(domain_key("example.com"), "domain_hits:example.com");
    }
}
