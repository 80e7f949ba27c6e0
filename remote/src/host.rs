use std::{path::Path, time::Duration};

use reqwest::{multipart, StatusCode};
use url::Url;

use crate::{error::*, model::*};

/// Handle on one isolated workspace (`folder`) of a remote execution host.
#[derive(Debug, Clone)]
pub struct RemoteHost {
    http: reqwest::Client,
    base_url: Url,
    folder: String,
}

impl RemoteHost {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Creates a client for `http://<address>:<port>/` with a fresh random workspace folder.
    pub fn new(address: &str, port: u16, timeout: Duration) -> Result<Self> {
        let url = format!("http://{}:{}/", address, port);
        let base_url = Url::parse(&url).map_err(|source| Error::InvalidAddress { url, source })?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            folder: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn target(&self, name: impl Into<String>, name_without_suffix: impl Into<String>) -> Target {
        Target {
            folder: self.folder.clone(),
            name: name.into(),
            name_without_suffix: name_without_suffix.into(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|source| Error::InvalidAddress {
                url: format!("{}{}", self.base_url, path),
                source,
            })
    }

    /// `POST /upload?folder=<folder>`, one multipart file part per entry.
    pub async fn upload(&self, files: &[(UploadField, &Path)]) -> Result<()> {
        let url = self.endpoint("upload")?;

        let mut form = multipart::Form::new();
        for &(field, path) in files {
            let name: &'static str = field.into();
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| Error::ReadUpload(path.to_owned(), e))?;
            let file_name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_owned());
            log::trace!("upload {} <- {} ({} bytes)", field, path.display(), data.len());
            form = form.part(name, multipart::Part::bytes(data).file_name(file_name));
        }

        let resp = self
            .http
            .post(url.clone())
            .query(&[("folder", &self.folder)])
            .multipart(form)
            .send()
            .await?;
        expect_success(resp.status(), &url)
    }

    /// `POST /compile`: builds `<name>` with the host's own toolchain.
    pub async fn compile(&self, target: &Target) -> Result<()> {
        let url = self.endpoint("compile")?;
        let resp = self.http.post(url.clone()).json(target).send().await?;
        expect_success(resp.status(), &url)
    }

    /// `POST /run`. A non-2xx answer is not an error here; it is reported as
    /// [`RunReport::Failed`] with whatever failure code could be read.
    pub async fn run(&self, target: &Target) -> Result<RunReport> {
        let url = self.endpoint("run")?;
        let resp = self.http.post(url.clone()).json(target).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if status.is_success() {
            let parsed: RunSuccessBody =
                serde_json::from_slice(&body).map_err(|source| Error::MalformedResponse {
                    requested_url: url.to_string(),
                    source,
                })?;
            return Ok(RunReport::Finished {
                time_ms: parsed.time,
            });
        }

        let code = match serde_json::from_slice::<RunFailureBody>(&body) {
            Ok(b) => FailureCode::from_code(b.code),
            Err(e) => {
                log::warn!(
                    "Unreadable failure body from {} (status {}): {}",
                    url,
                    status,
                    e
                );
                FailureCode::Unrecognized
            }
        };
        Ok(RunReport::Failed { status, code })
    }

    /// `POST /clean?folder=<folder>`: drops the whole remote workspace.
    pub async fn clean(&self) -> Result<()> {
        let url = self.endpoint("clean")?;
        let resp = self
            .http
            .post(url.clone())
            .query(&[("folder", &self.folder)])
            .send()
            .await?;
        expect_success(resp.status(), &url)
    }
}

fn expect_success(status: StatusCode, url: &Url) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::UnexpectedResponseCode {
            got: status,
            requested_url: url.to_string(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_url_and_endpoints() {
        let host = RemoteHost::new("10.0.0.7", 8080, RemoteHost::DEFAULT_TIMEOUT).unwrap();
        assert_eq!(host.base_url().as_str(), "http://10.0.0.7:8080/");
        assert_eq!(host.endpoint("run").unwrap().as_str(), "http://10.0.0.7:8080/run");
    }

    #[test]
    fn folders_are_unique_per_client() {
        let a = RemoteHost::new("localhost", 1, RemoteHost::DEFAULT_TIMEOUT).unwrap();
        let b = RemoteHost::new("localhost", 1, RemoteHost::DEFAULT_TIMEOUT).unwrap();
        assert_ne!(a.folder(), b.folder());
        assert_eq!(a.target("x-1", "x").folder, a.folder());
    }

    #[test]
    fn invalid_address() {
        let res = RemoteHost::new("bad host", 80, RemoteHost::DEFAULT_TIMEOUT);
        assert!(matches!(res, Err(Error::InvalidAddress { .. })));
    }
}
