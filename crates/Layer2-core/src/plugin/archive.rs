//! Archive helpers - 패키지 아카이브 및 디렉토리 트리 유틸리티

use plugbay_foundation::{Error, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// 인식하는 패키지 확장자 (대소문자 무시)
pub const PACKAGE_EXTENSIONS: &[&str] = &["zip"];

/// zip local-file-header, empty-archive, spanned-archive
pub const ZIP_SIGNATURES: [u32; 3] = [0x504B_0304, 0x504B_0506, 0x504B_0708];

/// 패키지 파일 확장자인지 확인
pub fn is_package_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            PACKAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// 처음 4바이트(big-endian)가 zip 시그니처인지 확인
pub async fn has_zip_signature(path: &Path) -> Result<bool> {
    let mut file = fs::File::open(path).await?;
    let mut header = [0u8; 4];

    match file.read_exact(&mut header).await {
        Ok(_) => Ok(ZIP_SIGNATURES.contains(&u32::from_be_bytes(header))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// zip 압축 해제 (blocking pool에서 실행)
pub async fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    debug!("Extracting {:?} to {:?}", archive, dest);

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| Error::extraction(&archive, e.to_string()))?;
        zip.extract(&dest)
            .map_err(|e| Error::extraction(&archive, e.to_string()))
    })
    .await
    .map_err(|e| Error::Internal(format!("Extraction task failed: {}", e)))?
}

/// 디렉토리 트리 복사
///
/// `overwrite`가 false면 대상에 이미 있는 파일은 건드리지 않음.
/// 최상위 레벨에서 `skip`에 포함된 이름은 제외.
pub async fn copy_tree(src: &Path, dest: &Path, overwrite: bool, skip: &[&str]) -> Result<()> {
    fs::create_dir_all(dest).await?;

    let mut entries = fs::read_dir(src).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_str().map_or(false, |n| skip.contains(&n)) {
            continue;
        }

        let src_path = entry.path();
        let dest_path = dest.join(&name);

        if entry.file_type().await?.is_dir() {
            Box::pin(copy_tree(&src_path, &dest_path, overwrite, &[])).await?;
        } else if overwrite || !fs::try_exists(&dest_path).await? {
            fs::copy(&src_path, &dest_path).await?;
        }
    }

    Ok(())
}

/// 파일 또는 디렉토리 삭제 (없으면 성공)
pub async fn delete_tree(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// 빈 디렉토리인지 확인
pub async fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_is_package_file() {
        assert!(is_package_file(Path::new("demo-1.0.zip")));
        assert!(is_package_file(Path::new("DEMO.ZIP")));
        assert!(!is_package_file(Path::new("demo.tar.gz")));
        assert!(!is_package_file(Path::new("demo")));
    }

    #[tokio::test]
    async fn test_zip_signature() {
        let temp = TempDir::new().unwrap();

        let zip_path = temp.path().join("ok.zip");
        write_zip(&zip_path, &[("a.txt", "a")]);
        assert!(has_zip_signature(&zip_path).await.unwrap());

        let bogus = temp.path().join("bogus.zip");
        std::fs::write(&bogus, b"not a zip at all").unwrap();
        assert!(!has_zip_signature(&bogus).await.unwrap());

        let short = temp.path().join("short.zip");
        std::fs::write(&short, b"PK").unwrap();
        assert!(!has_zip_signature(&short).await.unwrap());
    }

    #[tokio::test]
    async fn test_extract_zip() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("pkg.zip");
        write_zip(&zip_path, &[("plugin.json", "{}"), ("docs/readme.txt", "hi")]);

        let dest = temp.path().join("out");
        extract_zip(&zip_path, &dest).await.unwrap();

        assert!(dest.join("plugin.json").exists());
        assert_eq!(
            std::fs::read_to_string(dest.join("docs/readme.txt")).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn test_copy_tree_no_overwrite() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("a.conf"), "bundled").unwrap();
        std::fs::write(src.join("nested/b.conf"), "bundled").unwrap();
        std::fs::write(src.join("skip.me"), "x").unwrap();

        let dest = temp.path().join("dest");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("a.conf"), "user").unwrap();

        copy_tree(&src, &dest, false, &["skip.me"]).await.unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("a.conf")).unwrap(), "user");
        assert_eq!(
            std::fs::read_to_string(dest.join("nested/b.conf")).unwrap(),
            "bundled"
        );
        assert!(!dest.join("skip.me").exists());

        copy_tree(&src, &dest, true, &[]).await.unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("a.conf")).unwrap(), "bundled");
    }

    #[tokio::test]
    async fn test_delete_tree() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dir");
        std::fs::create_dir_all(dir.join("inner")).unwrap();
        std::fs::write(dir.join("inner/f"), "x").unwrap();

        delete_tree(&dir).await.unwrap();
        assert!(!dir.exists());

        // missing path is fine
        delete_tree(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_is_empty_dir() {
        let temp = TempDir::new().unwrap();
        assert!(is_empty_dir(temp.path()).await.unwrap());
        std::fs::write(temp.path().join("f"), "x").unwrap();
        assert!(!is_empty_dir(temp.path()).await.unwrap());
    }
}
