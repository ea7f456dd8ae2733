//! Arrival-order merging of two chunk channels.

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// Merge two channels into one that yields every element from either source
/// in arrival order, closing only once both sources have closed.
///
/// No ordering is promised across the two sources beyond arrival order.
pub fn merge_channels<T: Send + 'static>(
    left: mpsc::UnboundedReceiver<T>,
    right: mpsc::UnboundedReceiver<T>,
) -> mpsc::UnboundedReceiver<T> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut merged =
            UnboundedReceiverStream::new(left).merge(UnboundedReceiverStream::new(right));
        while let Some(item) = merged.next().await {
            if tx.send(item).is_err() {
                // downstream receiver dropped, nothing left to forward to
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_yields_every_element_from_both_sources() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let mut merged = merge_channels(left_rx, right_rx);

        left_tx.send("a").unwrap();
        right_tx.send("b").unwrap();
        left_tx.send("c").unwrap();
        drop(left_tx);
        drop(right_tx);

        let mut items = Vec::new();
        while let Some(item) = merged.recv().await {
            items.push(item);
        }

        items.sort_unstable();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stays_open_until_both_sources_close() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let mut merged = merge_channels(left_rx, right_rx);

        drop(left_tx);
        right_tx.send("late").unwrap();

        assert_eq!(merged.recv().await, Some("late"));

        drop(right_tx);
        assert_eq!(merged.recv().await, None);
    }

    #[tokio::test]
    async fn test_preserves_order_within_one_source() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (_right_tx, right_rx) = mpsc::unbounded_channel::<i32>();
        let mut merged = merge_channels(left_rx, right_rx);

        for i in 0..100 {
            left_tx.send(i).unwrap();
        }
        drop(left_tx);
        drop(_right_tx);

        let mut items = Vec::new();
        while let Some(item) = merged.recv().await {
            items.push(item);
        }
        assert_eq!(items, (0..100).collect::<Vec<_>>());
    }
}
