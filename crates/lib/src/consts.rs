//! Shared constants.

/// Maximum number of device uploads in flight at once.
pub const MAX_CONCURRENT_UPLOADS: usize = 6;

/// Extra attempts made for an upload that failed with a request-level error.
pub const MAX_UPLOAD_RETRIES: usize = 3;

/// Name of the file hash cache inside the build directory.
pub const FILE_CACHE_NAME: &str = ".filecache";

/// Schema version of the file hash cache. Any other version is discarded.
pub const FILE_CACHE_VERSION: u32 = 2;

/// Extension of per-target stamp files.
pub const STAMP_EXTENSION: &str = "stamp";

/// Chunk size used when streaming content to the device.
pub const CONTENT_CHUNK_SIZE: usize = 64 * 1024;

/// Header carrying the device filesystem name on upload requests.
pub const DEV_FS_NAME_HEADER: &str = "dev_fs_name";

/// Header carrying the base64-encoded destination URI on upload requests.
pub const DEV_FS_URI_HEADER: &str = "dev_fs_uri_b64";

/// Device directory that asset bundle entries are written below.
pub const DEVICE_ASSET_DIR: &str = "build/assets";

/// Suffix appended to the entry point's device path for the compiled artifact.
pub const INCREMENTAL_ARTIFACT_SUFFIX: &str = ".incremental.dill";
