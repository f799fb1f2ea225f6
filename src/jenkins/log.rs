//! Progressive console log reader.
//!
//! Jenkins serves the console log in chunks: each response carries the
//! offset to resume from in `X-Text-Size` and sets `X-More-Data: true` while
//! the build is still writing.

use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, stream};
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};

use super::{Credentials, check_status, transport_error};
use crate::backend::LogStream;
use crate::gateway::RemoteClientError;

const TEXT_SIZE_HEADER: &str = "X-Text-Size";
const MORE_DATA_HEADER: &str = "X-More-Data";

/// Delay before asking again when a running build produced no new output.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct LogCursor {
    http: Client,
    credentials: Credentials,
    url: Url,
    offset: u64,
}

#[derive(Debug)]
struct Chunk {
    bytes: Bytes,
    more: bool,
}

impl LogCursor {
    async fn fetch(&mut self) -> Result<Chunk, RemoteClientError> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("start", &self.offset.to_string());
        let sent = self
            .credentials
            .apply(self.http.get(url))
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(sent).await?;
        let progress = Progress::from_headers(response.headers());
        let bytes = response.bytes().await.map_err(transport_error)?;

        self.offset = progress.next_offset(self.offset, bytes.len());
        Ok(Chunk {
            bytes,
            more: progress.more,
        })
    }
}

/// Resume information carried by one progressive-log response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Progress {
    text_size: Option<u64>,
    more: bool,
}

impl Progress {
    fn from_headers(headers: &HeaderMap) -> Self {
        let text_size = headers
            .get(TEXT_SIZE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        let more = headers
            .get(MORE_DATA_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
        Self { text_size, more }
    }

    fn next_offset(self, current: u64, received: usize) -> u64 {
        self.text_size
            .unwrap_or_else(|| current.saturating_add(u64::try_from(received).unwrap_or(u64::MAX)))
    }
}

/// Opens the log at `url`.
///
/// The first chunk is read before returning so a missing build or a refused
/// request fails the call itself rather than the first stream item.
pub(super) async fn open(
    http: Client,
    credentials: Credentials,
    url: Url,
) -> Result<LogStream, RemoteClientError> {
    let mut cursor = LogCursor {
        http,
        credentials,
        url,
        offset: 0,
    };
    let first = cursor.fetch().await?;
    let head = (!first.bytes.is_empty()).then_some(Ok(first.bytes));
    let rest = first.more.then_some(cursor);

    let tail = stream::unfold(rest, |state| async move {
        let mut reader = state?;
        loop {
            match reader.fetch().await {
                Ok(chunk) if chunk.bytes.is_empty() => {
                    if !chunk.more {
                        return None;
                    }
                    tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                }
                Ok(chunk) => {
                    let next = chunk.more.then_some(reader);
                    return Some((Ok(chunk.bytes), next));
                }
                Err(err) => return Some((Err(err), None)),
            }
        }
    });

    Ok(stream::iter(head).chain(tail).boxed())
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue};
    use rstest::rstest;

    use super::Progress;

    fn headers(size: Option<&'static str>, more: Option<&'static str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(value) = size {
            map.insert("X-Text-Size", HeaderValue::from_static(value));
        }
        if let Some(value) = more {
            map.insert("X-More-Data", HeaderValue::from_static(value));
        }
        map
    }

    #[rstest]
    #[case::running(Some("1024"), Some("true"), Some(1024), true)]
    #[case::finished(Some("2048"), None, Some(2048), false)]
    #[case::uppercase(Some(" 12 "), Some("TRUE"), Some(12), true)]
    #[case::garbled(Some("lots"), Some("yes"), None, false)]
    fn reads_progress_headers(
        #[case] size: Option<&'static str>,
        #[case] more: Option<&'static str>,
        #[case] text_size: Option<u64>,
        #[case] expect_more: bool,
    ) {
        let progress = Progress::from_headers(&headers(size, more));
        assert_eq!(
            progress,
            Progress {
                text_size,
                more: expect_more
            }
        );
    }

    #[test]
    fn offset_falls_back_to_bytes_received() {
        let progress = Progress {
            text_size: None,
            more: true,
        };
        assert_eq!(progress.next_offset(100, 28), 128);
        let reported = Progress {
            text_size: Some(64),
            more: false,
        };
        assert_eq!(reported.next_offset(100, 28), 64);
    }
}
