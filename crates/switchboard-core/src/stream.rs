//! Stream combinators used by asynchronous resolution.

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

/// Either side of a [`combine_latest`] input.
enum Side<A, B> {
    Left(A),
    Right(B),
}

/// Pairs the latest item of each stream.
///
/// Emits once both streams have produced an item, then again on every item
/// from either side, paired with the other side's latest. Ends when both
/// inputs end.
pub fn combine_latest<A, B>(
    left: BoxStream<'static, A>,
    right: BoxStream<'static, B>,
) -> BoxStream<'static, (A, B)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    stream::select(left.map(Side::Left), right.map(Side::Right))
        .scan((None, None), |latest: &mut (Option<A>, Option<B>), side| {
            match side {
                Side::Left(a) => latest.0 = Some(a),
                Side::Right(b) => latest.1 = Some(b),
            }
            let pair = match latest {
                (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                _ => None,
            };
            future::ready(Some(pair))
        })
        .filter_map(future::ready)
        .boxed()
}

/// Drops items equal to the previously emitted one.
pub fn dedup<T>(input: BoxStream<'static, T>) -> BoxStream<'static, T>
where
    T: Clone + PartialEq + Send + 'static,
{
    input
        .scan(None, |last: &mut Option<T>, item| {
            if last.as_ref() == Some(&item) {
                return future::ready(Some(None));
            }
            *last = Some(item.clone());
            future::ready(Some(Some(item)))
        })
        .filter_map(future::ready)
        .boxed()
}
