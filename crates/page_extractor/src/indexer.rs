use std::sync::mpsc;

use image::DynamicImage;

use crate::images::ImageCandidate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("visual indexer is not available")]
    Unavailable,
    #[error("indexer rejected {url}: {reason}")]
    Rejected { url: String, reason: String },
}

/// Consumer of accepted images. Feature extraction and storage are its own concern.
///
/// Implementations load whatever models they need when they are constructed and are
/// passed to the parser explicitly.
pub trait VisualIndexer: Send + Sync {
    fn index(&self, candidate: &ImageCandidate, image: &DynamicImage) -> Result<(), IndexError>;
}

/// One image handed across a [`ChannelIndexer`].
#[derive(Debug)]
pub struct IndexRequest {
    pub candidate: ImageCandidate,
    pub image: DynamicImage,
    reply: mpsc::Sender<Result<(), IndexError>>,
}

impl IndexRequest {
    /// Reports the indexing result back to the waiting parser.
    pub fn complete(self, result: Result<(), IndexError>) {
        let _ = self.reply.send(result);
    }
}

/// Forwards images to a consumer thread that owns the real indexing backend and waits
/// for its answer.
///
/// A consumer that has gone away, or drops a request without completing it, counts
/// as [`IndexError::Unavailable`].
pub struct ChannelIndexer {
    tx: mpsc::Sender<IndexRequest>,
}

impl ChannelIndexer {
    pub fn new(tx: mpsc::Sender<IndexRequest>) -> Self {
        Self { tx }
    }
}

impl VisualIndexer for ChannelIndexer {
    fn index(&self, candidate: &ImageCandidate, image: &DynamicImage) -> Result<(), IndexError> {
        let (reply, answer) = mpsc::channel();
        let request = IndexRequest {
            candidate: candidate.clone(),
            image: image.clone(),
            reply,
        };
        self.tx.send(request).map_err(|_| IndexError::Unavailable)?;
        answer.recv().map_err(|_| IndexError::Unavailable)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;
    use std::thread;
    use url::Url;

    fn candidate() -> ImageCandidate {
        let url = Url::parse("http://img.test/a.png").unwrap();
        ImageCandidate {
            id: HashAlgorithm::Md5.hash(url.as_str().as_bytes()),
            url,
            alt: None,
            width: 1,
            height: 1,
            last_modified: None,
            page_url: Url::parse("http://img.test/").unwrap(),
        }
    }

    #[test]
    fn consumer_answer_is_returned() {
        let (tx, rx) = mpsc::channel::<IndexRequest>();
        let consumer = thread::spawn(move || {
            let mut seen = Vec::new();
            for request in rx {
                seen.push(request.candidate.url.to_string());
                let result = if seen.len() == 1 {
                    Ok(())
                } else {
                    Err(IndexError::Rejected {
                        url: request.candidate.url.to_string(),
                        reason: "full".into(),
                    })
                };
                request.complete(result);
            }
            seen
        });

        let indexer = ChannelIndexer::new(tx);
        let image = DynamicImage::new_rgb8(1, 1);
        assert_eq!(indexer.index(&candidate(), &image), Ok(()));
        assert!(matches!(
            indexer.index(&candidate(), &image),
            Err(IndexError::Rejected { .. })
        ));
        drop(indexer);
        assert_eq!(consumer.join().unwrap().len(), 2);
    }

    #[test]
    fn closed_channel_is_unavailable() {
        let (tx, rx) = mpsc::channel::<IndexRequest>();
        drop(rx);
        let indexer = ChannelIndexer::new(tx);
        let image = DynamicImage::new_rgb8(1, 1);
        assert_eq!(indexer.index(&candidate(), &image), Err(IndexError::Unavailable));
    }
}
