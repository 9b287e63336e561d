/// Post-commit hooks
///
/// Side effects best-effort (notification, ...) chạy SAU khi mutation đã commit.
/// Lỗi của từng hook chỉ được log, không bao giờ rollback hay làm fail operation.
/// `spawn` tách hooks khỏi request, reply không phải chờ collaborator chậm.
use futures_util::future::{join_all, LocalBoxFuture};
use std::future::Future;

use crate::api::error;

#[derive(Default)]
pub struct PostCommit {
    hooks: Vec<(String, LocalBoxFuture<'static, Result<(), error::SystemError>>)>,
}

impl PostCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, label: impl Into<String>, hook: F)
    where
        F: Future<Output = Result<(), error::SystemError>> + 'static,
    {
        self.hooks.push((label.into(), Box::pin(hook)));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Chạy hooks trên local task của worker hiện tại
    pub fn spawn(self) {
        if self.hooks.is_empty() {
            return;
        }
        actix_web::rt::spawn(async move {
            self.run().await;
        });
    }

    /// Chạy tất cả hooks đồng thời, trả về số hook bị lỗi
    pub async fn run(self) -> usize {
        let total = self.len();
        let (labels, futures): (Vec<_>, Vec<_>) = self.hooks.into_iter().unzip();
        let results = join_all(futures).await;

        let mut failed = 0;
        for (label, result) in labels.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                tracing::warn!("Post-commit hook '{}' failed: {}", label, e);
            }
        }
        if failed > 0 {
            tracing::debug!("{} of {} post-commit hooks failed", failed, total);
        }
        failed
    }
}
