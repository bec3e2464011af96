//! 파일 기반 키 저장소
//!
//! 데스크톱 Keychain이 없는 환경(헤드리스, CI, 개발)에서 사용합니다.
//! 식별자 하나당 파일 하나, 임시 파일에 쓰고 rename 하여 원자적으로 교체합니다.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{KeyStore, KeyStoreError};

#[derive(Debug, Clone)]
pub struct FileKeyStore {
    base_dir: PathBuf,
}

impl FileKeyStore {
    /// 디렉토리를 만들고 저장소 생성
    pub fn new_in_dir(base_dir: PathBuf) -> Result<Self, io::Error> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// 디렉토리가 이미 있다고 가정
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    // 식별자를 hex로 인코딩하여 서로 다른 식별자가 같은 파일이 되지 않게 함
    fn file_path(&self, identifier: &str) -> PathBuf {
        self.base_dir.join(format!("{}.key", hex::encode(identifier)))
    }

    fn map_io_error(context: &str, err: io::Error) -> KeyStoreError {
        match err.kind() {
            io::ErrorKind::PermissionDenied => {
                KeyStoreError::PermissionDenied(format!("{}: {}", context, err))
            }
            _ => KeyStoreError::Other(format!("{}: {}", context, err)),
        }
    }
}

/// 처음부터 0600으로 생성하고 rename 전에 디스크까지 기록
fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl KeyStore for FileKeyStore {
    fn store(&self, identifier: &str, bytes: &[u8]) -> Result<(), KeyStoreError> {
        let path = self.file_path(identifier);
        let tmp_path = path.with_extension("key.tmp");

        let result = write_synced(&tmp_path, bytes)
            .map_err(|e| Self::map_io_error("failed to write key temp file", e))
            .and_then(|()| {
                fs::rename(&tmp_path, &path)
                    .map_err(|e| Self::map_io_error("failed to rename key file", e))
            });

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn retrieve(&self, identifier: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
        match fs::read(self.file_path(identifier)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::map_io_error("failed to read key file", err)),
        }
    }

    fn remove(&self, identifier: &str) -> Result<(), KeyStoreError> {
        match fs::remove_file(self.file_path(identifier)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::map_io_error("failed to delete key file", err)),
        }
    }
}
