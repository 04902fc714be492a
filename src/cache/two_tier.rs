// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-Tier Cache (`spec.md` §4.I): memory-first reads with disk-hit
//! promotion, dual-tier writes.

use std::io::Read;
use std::time::Duration;

use crate::error::Result;

use super::disk::DiskCache;
use super::memory::MemoryCache;

/// Per-operation addressing: which upstream source the bytes came from and
/// what logical key identifies them within that source.
pub struct CacheContext<'a> {
    pub source: &'a str,
    pub key: &'a str,
}

pub struct TwoTierCache {
    memory: MemoryCache,
    disk: DiskCache,
}

impl TwoTierCache {
    pub fn new(memory: MemoryCache, disk: DiskCache) -> Self {
        Self { memory, disk }
    }

    fn memory_key(ctx: &CacheContext) -> String {
        format!("{}\u{0}{}", ctx.source, ctx.key)
    }

    /// Memory hit returns immediately with no disk I/O. A disk hit promotes
    /// the bytes into memory under `max_age` before returning; an expired
    /// disk entry does not promote.
    pub fn get(&self, ctx: &CacheContext, max_age: Duration) -> Result<Option<Vec<u8>>> {
        let memory_key = Self::memory_key(ctx);

        if let Some(hit) = self.memory.get(&memory_key) {
            return Ok(Some(hit));
        }

        let Some(mut file) = self.disk.get(ctx.source, ctx.key, max_age)? else {
            return Ok(None);
        };

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        self.memory.set(memory_key, buf.clone(), max_age);
        Ok(Some(buf))
    }

    /// Writes memory unconditionally, then re-drains the same buffer into
    /// disk (single-reader restriction means we can't share one stream
    /// across both tiers). A disk validation failure is surfaced, but the
    /// memory tier keeps its value: the memory tier is a best-effort mirror.
    pub fn set<R: Read>(
        &self,
        ctx: &CacheContext,
        mut reader: R,
        ttl: Duration,
        validator: Option<&dyn Fn(&mut std::fs::File) -> Result<()>>,
    ) -> Result<()> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;

        self.memory.set(Self::memory_key(ctx), buf.clone(), ttl);
        self.disk
            .set(ctx.source, ctx.key, std::io::Cursor::new(buf), validator)
    }

    /// Clears both tiers. The memory tier is cleared unconditionally even if
    /// the disk tier's directory removal fails.
    pub fn clear(&self) -> Result<()> {
        self.memory.clear();
        self.disk.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_hit_short_circuits_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TwoTierCache::new(MemoryCache::new(10, 4096), DiskCache::new(dir.path()));
        let ctx = CacheContext { source: "src", key: "k" };

        cache
            .set(&ctx, std::io::Cursor::new(b"hello".to_vec()), Duration::from_secs(60), None)
            .unwrap();

        // Remove the disk entry directly; a memory hit must still succeed.
        std::fs::remove_dir_all(dir.path()).unwrap();
        let hit = cache.get(&ctx, Duration::from_secs(60)).unwrap();
        assert_eq!(hit, Some(b"hello".to_vec()));
    }

    #[test]
    fn disk_hit_promotes_into_memory() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        disk.set("src", "k", std::io::Cursor::new(b"world".to_vec()), None)
            .unwrap();

        let memory = MemoryCache::new(10, 4096);
        let cache = TwoTierCache::new(memory, disk);
        let ctx = CacheContext { source: "src", key: "k" };

        let first = cache.get(&ctx, Duration::from_secs(60)).unwrap();
        assert_eq!(first, Some(b"world".to_vec()));

        let second = cache.memory.get(&TwoTierCache::memory_key(&ctx));
        assert_eq!(second, Some(b"world".to_vec()));
    }

    #[test]
    fn clear_empties_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TwoTierCache::new(MemoryCache::new(10, 4096), DiskCache::new(dir.path()));
        let ctx = CacheContext { source: "src", key: "k" };

        cache
            .set(&ctx, std::io::Cursor::new(b"hello".to_vec()), Duration::from_secs(60), None)
            .unwrap();
        assert!(cache.get(&ctx, Duration::from_secs(60)).unwrap().is_some());

        cache.clear().unwrap();

        assert!(cache.memory.get(&TwoTierCache::memory_key(&ctx)).is_none());
        assert!(cache.get(&ctx, Duration::from_secs(60)).unwrap().is_none());
    }

    #[test]
    fn miss_when_neither_tier_has_it() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TwoTierCache::new(MemoryCache::new(10, 4096), DiskCache::new(dir.path()));
        let ctx = CacheContext { source: "src", key: "missing" };
        assert_eq!(cache.get(&ctx, Duration::from_secs(60)).unwrap(), None);
    }
}
