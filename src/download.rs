// DriveShare Downloads
// Streams an entry's download URL to a local file with progress callbacks

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::notifications::{SharedDownloads, SharedNotifications};
use crate::portal::Entry;

/// Progress callback: (bytes written, total bytes or 0 when unknown)
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Folders cannot be downloaded")]
    IsFolder,
    #[error("Another download is in progress")]
    Busy,
    #[error("No download link for {0}")]
    MissingUrl(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Download failed: HTTP {0}")]
    Status(u16),
    #[error("Transfer failed: {0}")]
    Transfer(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Replace characters that are unsafe in local file names
pub fn suggested_file_name(entry: &Entry) -> String {
    let cleaned: String = entry
        .name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        format!("download-{}", entry.id)
    } else {
        cleaned
    }
}

/// Resolve the target path: a directory gets the entry's suggested name
pub fn resolve_destination(entry: &Entry, dest: &Path) -> PathBuf {
    if dest.is_dir() {
        dest.join(suggested_file_name(entry))
    } else {
        dest.to_path_buf()
    }
}

/// Download `entry` into `dest`, returning the number of bytes written
pub async fn download_entry(
    client: &reqwest::Client,
    entry: &Entry,
    dest: &Path,
    on_progress: Option<ProgressFn>,
) -> Result<u64, DownloadError> {
    if entry.is_container() {
        return Err(DownloadError::IsFolder);
    }
    let url = if !entry.download_url.is_empty() {
        entry.download_url.as_str()
    } else if !entry.url.is_empty() {
        entry.url.as_str()
    } else {
        return Err(DownloadError::MissingUrl(entry.name.clone()));
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DownloadError::Connection(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status().as_u16()));
    }

    let total = response.content_length().unwrap_or(entry.size);
    let target = resolve_destination(entry, dest);
    let partial = partial_path(&target);

    let written = match write_body(response, &partial, total, on_progress).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!("Could not remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&partial, &target).await?;

    info!("Downloaded {} to {} ({} bytes)", entry.name, target.display(), written);
    Ok(written)
}

/// Download through the shared tracker
///
/// Refused with [`DownloadError::Busy`] while another tracked download runs.
/// The tracker follows every chunk; completion or failure is posted to `center`.
pub async fn download_tracked(
    client: &reqwest::Client,
    entry: &Entry,
    dest: &Path,
    tracker: &SharedDownloads,
    center: &SharedNotifications,
    on_progress: Option<ProgressFn>,
) -> Result<u64, DownloadError> {
    if !tracker
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .start(entry.name.clone(), entry.size)
    {
        return Err(DownloadError::Busy);
    }

    let live = tracker.clone();
    let progress: ProgressFn = Box::new(move |done, total| {
        live.lock().unwrap_or_else(|p| p.into_inner()).update(done, total);
        if let Some(ref inner) = on_progress {
            inner(done, total);
        }
    });

    let result = download_entry(client, entry, dest, Some(progress)).await;

    let mut tracker = tracker.lock().unwrap_or_else(|p| p.into_inner());
    let mut center = center.lock().unwrap_or_else(|p| p.into_inner());
    match &result {
        Ok(_) => tracker.finish(&mut center),
        Err(e) => tracker.fail(&mut center, &e.to_string()),
    }
    result
}

/// Sibling path the body is streamed into before it is moved into place
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

async fn write_body(
    response: reqwest::Response,
    path: &Path,
    total: u64,
    on_progress: Option<ProgressFn>,
) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::Transfer(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        if let Some(ref progress) = on_progress {
            progress(written, total);
        }
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{DownloadTracker, NotificationCenter, ToastKind};
    use crate::portal::testing::serve_once_with;
    use std::sync::{Arc, Mutex};

    async fn serve_bytes(status: &'static str, body: &'static [u8]) -> String {
        serve_once_with(status, "application/octet-stream", body).await.0
    }

    #[test]
    fn test_suggested_file_name() {
        let entry = Entry::file("id1", "Q1: report/final?.pdf", "application/pdf", 1);
        assert_eq!(suggested_file_name(&entry), "Q1_ report_final_.pdf");
        let blank = Entry::file("id2", " .. ", "text/plain", 1);
        assert_eq!(suggested_file_name(&blank), "download-id2");
    }

    #[tokio::test]
    async fn test_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let err = download_entry(&client, &Entry::folder("f", "Photos"), dir.path(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::IsFolder));
    }

    #[tokio::test]
    async fn test_missing_url() {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let entry = Entry::file("a", "a.txt", "text/plain", 3);
        let err = download_entry(&client, &entry, dir.path(), None).await.unwrap_err();
        assert!(matches!(err, DownloadError::MissingUrl(_)));
    }

    #[tokio::test]
    async fn test_streams_to_directory_with_progress() {
        let url = serve_bytes("200 OK", b"hello world").await;
        let dir = tempfile::tempdir().unwrap();
        let mut entry = Entry::file("a", "greeting.txt", "text/plain", 11);
        entry.download_url = url;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Box::new(move |done, total| sink.lock().unwrap().push((done, total)));

        let client = reqwest::Client::new();
        let written = download_entry(&client, &entry, dir.path(), Some(progress)).await.unwrap();
        assert_eq!(written, 11);

        let saved = std::fs::read_to_string(dir.path().join("greeting.txt")).unwrap();
        assert_eq!(saved, "hello world");
        assert_eq!(seen.lock().unwrap().last(), Some(&(11, 11)));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let url = serve_bytes("404 Not Found", b"").await;
        let dir = tempfile::tempdir().unwrap();
        let mut entry = Entry::file("a", "gone.txt", "text/plain", 0);
        entry.url = url;

        let client = reqwest::Client::new();
        let err = download_entry(&client, &entry, &dir.path().join("out.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Status(404)));
        assert!(!dir.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn test_interrupted_transfer_leaves_no_file() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/file", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\npartial")
                .await
                .unwrap();
            socket.shutdown().await.ok();
        });

        let dir = tempfile::tempdir().unwrap();
        let mut entry = Entry::file("a", "big.bin", "application/octet-stream", 1000);
        entry.download_url = url;

        let client = reqwest::Client::new();
        let err = download_entry(&client, &entry, dir.path(), None).await.unwrap_err();
        assert!(matches!(err, DownloadError::Transfer(_)));
        assert!(!dir.path().join("big.bin").exists());
        assert!(!dir.path().join("big.bin.part").exists());
    }

    #[tokio::test]
    async fn test_tracked_download_reports_live_progress() {
        let url = serve_bytes("200 OK", b"hello world").await;
        let dir = tempfile::tempdir().unwrap();
        let mut entry = Entry::file("a", "greeting.txt", "text/plain", 11);
        entry.download_url = url;

        let tracker = DownloadTracker::shared();
        let center = NotificationCenter::shared(std::time::Duration::from_secs(3));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (sink, watched) = (seen.clone(), tracker.clone());
        let progress: ProgressFn = Box::new(move |_, _| {
            let transferred = watched.lock().unwrap().progress().map(|p| p.transferred);
            sink.lock().unwrap().push(transferred);
        });

        let client = reqwest::Client::new();
        let written = download_tracked(&client, &entry, dir.path(), &tracker, &center, Some(progress))
            .await
            .unwrap();
        assert_eq!(written, 11);
        assert_eq!(seen.lock().unwrap().last(), Some(&Some(11)));
        assert!(!tracker.lock().unwrap().is_active());

        let center = center.lock().unwrap();
        let toast = center.visible().next().unwrap();
        assert_eq!(toast.kind, ToastKind::Success);
        assert_eq!(toast.message, "Download complete: greeting.txt");
    }

    #[tokio::test]
    async fn test_tracked_download_is_single_flight() {
        let dir = tempfile::tempdir().unwrap();
        let mut entry = Entry::file("b", "second.txt", "text/plain", 1);
        entry.download_url = "http://127.0.0.1:9/never".to_string();

        let tracker = DownloadTracker::shared();
        let center = NotificationCenter::shared(std::time::Duration::from_secs(3));
        assert!(tracker.lock().unwrap().start("first.txt", 100));

        let client = reqwest::Client::new();
        let err = download_tracked(&client, &entry, dir.path(), &tracker, &center, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Busy));
        assert_eq!(tracker.lock().unwrap().progress().unwrap().name, "first.txt");
        assert!(center.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tracked_failure_posts_error_and_frees_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Entry::file("c", "nowhere.txt", "text/plain", 1);

        let tracker = DownloadTracker::shared();
        let center = NotificationCenter::shared(std::time::Duration::from_secs(3));
        let client = reqwest::Client::new();
        let err = download_tracked(&client, &entry, dir.path(), &tracker, &center, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::MissingUrl(_)));
        assert!(!tracker.lock().unwrap().is_active());
        assert_eq!(center.lock().unwrap().visible().next().unwrap().kind, ToastKind::Error);
    }

    #[test]
    fn test_partial_path_is_a_sibling() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/report.pdf")),
            PathBuf::from("/tmp/out/report.pdf.part")
        );
    }
}
