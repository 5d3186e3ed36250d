use crate::server::{store::BlogCursor, telemetry::increment_blogs_streamed};
use blog_tonic_core::{Error, proto::ListBlogResponse};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Forwards every document from `cursor` to the `ListBlog` response channel.
///
/// The cursor is owned by this function, so it is released on every exit
/// path: exhaustion, a cursor error, a client disconnect, or shutdown.
///
/// # Behavior
///
/// - Sends one [`ListBlogResponse`] per decoded document, in cursor order.
/// - On a cursor error, forwards it once as an `INTERNAL` status and stops.
///   Shutdown abandons the forward if the client is not reading.
/// - Returns early with [`Error::ChannelError`] if the client goes away, even
///   while waiting on the cursor.
/// - Stops with [`Error::ServiceShutdown`] when `shutdown` is cancelled,
///   making a best effort to tell the client.
///
/// Returns the number of blogs sent.
pub async fn feed_blogs(
    mut cursor: BlogCursor,
    resp_tx: mpsc::Sender<Result<ListBlogResponse, Status>>,
    shutdown: CancellationToken,
) -> blog_tonic_core::Result<usize> {
    let mut sent = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Err(notify_shutdown(&resp_tx)),
            () = resp_tx.closed() => {
                return Err(Error::ChannelError {
                    context: "client disconnected".to_string(),
                });
            }
            next = cursor.next() => next,
        };

        match next {
            None => return Ok(sent),
            Some(Ok(doc)) => {
                let msg = ListBlogResponse {
                    blog: Some(doc.into_blog()),
                };
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => return Err(notify_shutdown(&resp_tx)),
                    res = resp_tx.send(Ok(msg)) => {
                        if let Err(e) = res {
                            return Err(Error::ChannelError {
                                context: format!("Failed to forward blog: {e}"),
                            });
                        }
                    }
                }
                sent += 1;
                increment_blogs_streamed();
            }
            Some(Err(e)) => {
                // Best effort: the client may already be gone, in which case
                // the original error is still what we report upstream.
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => {
                        tracing::debug!("Shutdown while forwarding cursor error");
                    }
                    res = resp_tx.send(Err(e.clone().into())) => {
                        if let Err(send_err) = res {
                            tracing::warn!("Failed to forward err: {send_err}");
                        }
                    }
                }
                return Err(e);
            }
        }
    }
}

fn notify_shutdown(resp_tx: &mpsc::Sender<Result<ListBlogResponse, Status>>) -> Error {
    if resp_tx.try_send(Err(Error::ServiceShutdown.into())).is_err() {
        tracing::debug!("Could not notify client of shutdown");
    }
    Error::ServiceShutdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::BlogDocument;
    use bson::oid::ObjectId;
    use core::{
        pin::Pin,
        task::{Context, Poll},
        time::Duration,
    };
    use futures::Stream;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };
    use tonic::Code;

    fn doc(title: &str) -> BlogDocument {
        BlogDocument {
            id: Some(ObjectId::new()),
            author_id: "author".into(),
            content: "content".into(),
            title: title.into(),
        }
    }

    fn cursor(items: Vec<blog_tonic_core::Result<BlogDocument>>) -> BlogCursor {
        Box::pin(futures::stream::iter(items))
    }

    /// Cursor that never ends and records when it is dropped.
    struct EndlessCursor {
        dropped: Arc<AtomicBool>,
    }

    impl Stream for EndlessCursor {
        type Item = blog_tonic_core::Result<BlogDocument>;

        fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Poll::Ready(Some(Ok(doc("again"))))
        }
    }

    impl Drop for EndlessCursor {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn forwards_every_document_then_finishes() {
        let (tx, mut rx) = mpsc::channel(8);
        let sent = feed_blogs(
            cursor(vec![Ok(doc("one")), Ok(doc("two"))]),
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(sent, 2);

        let mut titles = Vec::new();
        while let Some(msg) = rx.recv().await {
            titles.push(msg.unwrap().blog.unwrap().title);
        }
        assert_eq!(titles, ["one", "two"]);
    }

    #[tokio::test]
    async fn cursor_error_terminates_stream_with_internal() {
        let (tx, mut rx) = mpsc::channel(8);
        let failure = Error::Store {
            context: "cursor died".into(),
        };
        let err = feed_blogs(
            cursor(vec![Ok(doc("one")), Err(failure.clone()), Ok(doc("never"))]),
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err, failure);

        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(rx.recv().await.unwrap().unwrap_err().code(), Code::Internal);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn client_disconnect_releases_cursor() {
        let dropped = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(feed_blogs(
            Box::pin(EndlessCursor {
                dropped: Arc::clone(&dropped),
            }),
            tx,
            CancellationToken::new(),
        ));

        assert!(rx.recv().await.unwrap().is_ok());
        drop(rx);

        let res = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(res, Err(Error::ChannelError { .. })));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_unblocks_error_forward_to_stalled_client() {
        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let failure = Error::Store {
            context: "cursor died".into(),
        };
        // The first blog fills the channel and nobody reads it, so forwarding
        // the error has to wait.
        let task = tokio::spawn(feed_blogs(
            cursor(vec![Ok(doc("one")), Err(failure.clone())]),
            tx,
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        token.cancel();

        let res = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res.unwrap_err(), failure);
        drop(rx);
    }

    #[tokio::test]
    async fn shutdown_stops_feeding_and_notifies_client() {
        let dropped = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();
        token.cancel();
        let (tx, mut rx) = mpsc::channel(1);

        let res = feed_blogs(
            Box::pin(EndlessCursor {
                dropped: Arc::clone(&dropped),
            }),
            tx,
            token,
        )
        .await;

        assert_eq!(res.unwrap_err(), Error::ServiceShutdown);
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(rx.recv().await.unwrap().unwrap_err().code(), Code::Unavailable);
    }
}
