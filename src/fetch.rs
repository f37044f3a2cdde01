//! Schedule page retrieval.

use std::time::Duration;

use async_trait::async_trait;

use crate::model::ScheduleDate;

/// Errors that can occur while fetching the schedule page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server answered {0}")]
    Status(reqwest::StatusCode),
}

/// Produces the raw schedule markup for a date.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch_markup(&self, date: ScheduleDate) -> Result<String, FetchError>;
}

/// Fetches the schedule over HTTP.
///
/// The page expects a form POST with `seldate={"date_in":"dd-MM-yyyy"}`.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blackout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    fn classify(&self, e: &reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Form value the page expects for a date.
pub(crate) fn seldate(date: ScheduleDate) -> String {
    serde_json::json!({ "date_in": date.to_string() }).to_string()
}

#[async_trait]
impl ScheduleSource for HttpSource {
    async fn fetch_markup(&self, date: ScheduleDate) -> Result<String, FetchError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("seldate", seldate(date))])
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await.map_err(|e| self.classify(&e))?;
        tracing::debug!(%date, bytes = body.len(), "fetched schedule page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    #[test]
    fn seldate_payload() {
        let d = ScheduleDate::new(date(2025, 11, 3));
        assert_eq!(seldate(d), r#"{"date_in":"03-11-2025"}"#);
    }

    #[test]
    fn builds_client() {
        let source = HttpSource::new("http://localhost/gpv", Duration::from_secs(15)).unwrap();
        assert_eq!(source.url, "http://localhost/gpv");
        assert_eq!(source.timeout, Duration::from_secs(15));
    }

    /// Accept one connection, read the whole request, answer with `response`.
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            request
        });
        (format!("http://{addr}/gpv"), handle)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            let Some(head_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let body_len = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn day() -> ScheduleDate {
        ScheduleDate::new(date(2025, 11, 3))
    }

    #[tokio::test]
    async fn posts_date_form_and_returns_body() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 9\r\nconnection: close\r\n\r\n<p>ok</p>",
        )
        .await;
        let source = HttpSource::new(url, Duration::from_secs(5)).unwrap();

        let body = source.fetch_markup(day()).await.unwrap();
        assert_eq!(body, "<p>ok</p>");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /gpv "));
        assert!(request.contains("seldate=%7B%22date_in%22%3A%2203-11-2025%22%7D"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (url, _server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let source = HttpSource::new(url, Duration::from_secs(5)).unwrap();

        let err = source.fetch_markup(day()).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status(status) if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // Connections complete in the backlog; nothing ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/gpv", listener.local_addr().unwrap());
        let source = HttpSource::new(url, Duration::from_millis(200)).unwrap();

        let err = source.fetch_markup(day()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(t) if t == Duration::from_millis(200)));
        drop(listener);
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let source = HttpSource::new(format!("http://{addr}/gpv"), Duration::from_secs(5)).unwrap();

        let err = source.fetch_markup(day()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
