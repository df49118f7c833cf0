use rocksdb::Options;

/// Selected RocksDB options. The node's store is small and written by a handful of writers,
/// so the defaults are modest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RocksdbConfig {
    /// The maximum number of files that can be open concurrently. Defaults to 512
    pub max_open_files: i32,
    /// Once write-ahead logs exceed this size, RocksDB will start forcing memtable flushes.
    /// Defaults to 64MB
    pub max_total_wal_size: u64,
    /// The maximum number of background threads, including threads for flushing and compaction. Defaults to 4.
    pub max_background_jobs: i32,
}

impl Default for RocksdbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 512,
            max_total_wal_size: 64 << 20,
            max_background_jobs: 4,
        }
    }
}

/// Generate [`rocksdb::Options`] corresponding to the given [`RocksdbConfig`].
pub fn gen_rocksdb_options(config: &RocksdbConfig, readonly: bool) -> Options {
    let mut db_opts = Options::default();
    db_opts.set_max_open_files(config.max_open_files);
    db_opts.set_max_total_wal_size(config.max_total_wal_size);
    db_opts.set_max_background_jobs(config.max_background_jobs);
    db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
    if !readonly {
        db_opts.create_if_missing(true);
    }

    db_opts
}
