//! # Artifact Cache
//!
//! Holds one named build artifact on disk and serves it with
//! `If-Modified-Since` revalidation. The file's mtime is the artifact's
//! last-modified time. Every replace moves it forward by at least one whole
//! second, so a client holding the previous version never matches the new
//! one's `Last-Modified`.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, Utc};

use crate::error::ArtifactError;
use crate::fsutil::{ensure_private_dir, write_atomic_with};
use crate::timestamp::{parse_http_date, truncate_to_seconds};

/// Result of a conditional read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactServe {
    /// The client copy is current. No body.
    NotModified { last_modified: DateTime<Utc> },
    /// Full content, with its whole-second last-modified time.
    Fresh {
        last_modified: DateTime<Utc>,
        content: Vec<u8>,
    },
}

impl ArtifactServe {
    pub fn last_modified(&self) -> DateTime<Utc> {
        match self {
            Self::NotModified { last_modified } | Self::Fresh { last_modified, .. } => {
                *last_modified
            }
        }
    }
}

/// A single cached artifact file.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    name: String,
    path: PathBuf,
}

impl ArtifactCache {
    /// Cache `name` inside `dir`, creating the directory if needed.
    /// The artifact itself stays absent until the first [`Self::replace`].
    pub fn open(dir: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        ensure_private_dir(dir).map_err(|e| ArtifactError::io(dir, e))?;
        let name = name.into();
        let path = dir.join(&name);
        Ok(Self { name, path })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Install new content. Concurrent readers see the old artifact or the
    /// new one, never a mix.
    ///
    /// The new whole-second mtime is strictly later than the previous one;
    /// if the clock has not advanced far enough it is set to the previous
    /// value plus one second.
    pub fn replace(&self, content: &[u8]) -> Result<(), ArtifactError> {
        let previous = self.last_modified()?.map(truncate_to_seconds);
        write_atomic_with(&self.path, content, |file| {
            let Some(previous) = previous else {
                return Ok(());
            };
            let written = truncate_to_seconds(DateTime::<Utc>::from(file.metadata()?.modified()?));
            if written <= previous {
                file.set_modified(SystemTime::from(previous + Duration::seconds(1)))?;
            }
            Ok(())
        })
        .map_err(|e| ArtifactError::io(&self.path, e))?;
        tracing::info!(artifact = %self.name, bytes = content.len(), "artifact replaced");
        Ok(())
    }

    /// Full-precision mtime, or `None` while the artifact is absent.
    pub fn last_modified(&self) -> Result<Option<DateTime<Utc>>, ArtifactError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| ArtifactError::io(&self.path, e))?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArtifactError::io(&self.path, e)),
        }
    }

    /// Whether the cached copy is at least as recent as `candidate`, i.e.
    /// the candidate is *not* newer. An absent artifact is never current.
    pub fn is_newer(&self, candidate: DateTime<Utc>) -> Result<bool, ArtifactError> {
        Ok(self
            .last_modified()?
            .is_some_and(|mtime| mtime >= candidate))
    }

    /// Conditional read against an `If-Modified-Since` header value.
    ///
    /// A missing or unparsable header counts as the earliest possible
    /// time. The mtime is truncated to whole seconds before comparing, as
    /// HTTP dates cannot express anything finer.
    pub fn serve(&self, if_modified_since: Option<&str>) -> Result<ArtifactServe, ArtifactError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactError::Missing {
                    name: self.name.clone(),
                })
            }
            Err(e) => return Err(ArtifactError::io(&self.path, e)),
        };

        // Metadata and content come from the same handle.
        let meta = file.metadata().map_err(|e| ArtifactError::io(&self.path, e))?;
        let modified = meta.modified().map_err(|e| ArtifactError::io(&self.path, e))?;
        let last_modified = truncate_to_seconds(DateTime::<Utc>::from(modified));

        let since = if_modified_since.and_then(parse_http_date);
        if since.is_some_and(|since| last_modified <= since) {
            return Ok(ArtifactServe::NotModified { last_modified });
        }

        let mut content = Vec::with_capacity(meta.len() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| ArtifactError::io(&self.path, e))?;
        Ok(ArtifactServe::Fresh {
            last_modified,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::format_http_date;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn set_mtime(path: &Path, at: DateTime<Utc>) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::from(at)).unwrap();
    }

    fn cache_with(content: &[u8], mtime: DateTime<Utc>) -> (tempfile::TempDir, ArtifactCache) {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(tmp.path().join("bin"), "lokinet").unwrap();
        cache.replace(content).unwrap();
        set_mtime(cache.path(), mtime);
        (tmp, cache)
    }

    #[test]
    fn absent_artifact_is_missing_never_not_modified() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(tmp.path(), "lokinet").unwrap();
        let err = cache.serve(Some("Sun, 01 Mar 2026 12:00:00 GMT")).unwrap_err();
        assert!(matches!(err, ArtifactError::Missing { ref name } if name == "lokinet"));
        assert_eq!(err.to_string(), "lokinet not available");
        assert!(cache.last_modified().unwrap().is_none());
    }

    #[test]
    fn no_header_serves_full_content() {
        let (_tmp, cache) = cache_with(b"binary", t0());
        match cache.serve(None).unwrap() {
            ArtifactServe::Fresh {
                last_modified,
                content,
            } => {
                assert_eq!(last_modified, t0());
                assert_eq!(content, b"binary");
            }
            other => panic!("expected Fresh, got {other:?}"),
        }
    }

    #[test]
    fn header_equal_to_mtime_is_not_modified() {
        let (_tmp, cache) = cache_with(b"binary", t0());
        let served = cache.serve(Some(&format_http_date(t0()))).unwrap();
        assert_eq!(served, ArtifactServe::NotModified { last_modified: t0() });
    }

    #[test]
    fn header_one_second_earlier_is_fresh() {
        let (_tmp, cache) = cache_with(b"binary", t0());
        let served = cache
            .serve(Some(&format_http_date(t0() - Duration::seconds(1))))
            .unwrap();
        assert!(matches!(served, ArtifactServe::Fresh { .. }));
    }

    #[test]
    fn subsecond_mtime_still_matches_its_own_header() {
        let (_tmp, cache) = cache_with(b"binary", t0() + Duration::milliseconds(400));
        let served = cache.serve(Some(&format_http_date(t0()))).unwrap();
        assert!(matches!(served, ArtifactServe::NotModified { .. }));
    }

    #[test]
    fn unparsable_header_counts_as_earliest() {
        let (_tmp, cache) = cache_with(b"binary", t0());
        assert!(matches!(
            cache.serve(Some("last tuesday")).unwrap(),
            ArtifactServe::Fresh { .. }
        ));
    }

    #[test]
    fn is_newer_compares_against_mtime() {
        let (_tmp, cache) = cache_with(b"binary", t0());
        assert!(cache.is_newer(t0()).unwrap());
        assert!(cache.is_newer(t0() - Duration::seconds(1)).unwrap());
        assert!(!cache.is_newer(t0() + Duration::seconds(1)).unwrap());
    }

    #[test]
    fn is_newer_on_absent_artifact_accepts_any_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(tmp.path(), "lokinet").unwrap();
        assert!(!cache.is_newer(t0()).unwrap());
    }

    #[test]
    fn back_to_back_replaces_change_last_modified() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(tmp.path(), "lokinet").unwrap();
        cache.replace(b"v1").unwrap();
        let held = cache.serve(None).unwrap().last_modified();

        cache.replace(b"v2").unwrap();
        match cache.serve(Some(&format_http_date(held))).unwrap() {
            ArtifactServe::Fresh {
                last_modified,
                content,
            } => {
                assert!(last_modified > held);
                assert_eq!(content, b"v2");
            }
            other => panic!("expected Fresh, got {other:?}"),
        }
    }

    #[test]
    fn replace_never_moves_last_modified_backwards() {
        let ahead = Utc::now() + Duration::hours(1);
        let (_tmp, cache) = cache_with(b"v1", ahead);
        cache.replace(b"v2").unwrap();
        let served = cache.serve(None).unwrap();
        assert_eq!(served.last_modified(), truncate_to_seconds(ahead) + Duration::seconds(1));
    }

    #[test]
    fn concurrent_readers_see_whole_versions() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(tmp.path(), "lokinet").unwrap();
        let versions: Vec<Vec<u8>> = (0u8..4).map(|v| vec![v; 256 * 1024]).collect();
        cache.replace(&versions[0]).unwrap();

        std::thread::scope(|scope| {
            let writer = &cache;
            let versions_ref = &versions;
            scope.spawn(move || {
                for round in 0..20 {
                    writer.replace(&versions_ref[round % versions_ref.len()]).unwrap();
                }
            });
            for _ in 0..4 {
                let reader = &cache;
                scope.spawn(move || {
                    for _ in 0..50 {
                        match reader.serve(None).unwrap() {
                            ArtifactServe::Fresh { content, .. } => {
                                assert!(versions_ref.contains(&content));
                            }
                            other => panic!("expected Fresh, got {other:?}"),
                        }
                    }
                });
            }
        });
    }

    #[test]
    fn replace_then_serve_returns_new_content_with_later_mtime() {
        let (_tmp, cache) = cache_with(b"old", t0());
        cache.replace(b"new build").unwrap();
        match cache.serve(Some(&format_http_date(t0()))).unwrap() {
            ArtifactServe::Fresh {
                last_modified,
                content,
            } => {
                assert!(last_modified > t0());
                assert_eq!(content, b"new build");
            }
            other => panic!("expected Fresh, got {other:?}"),
        }
    }
}
