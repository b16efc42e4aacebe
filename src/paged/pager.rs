//! Strategy used by [`PagedVolume`](super::PagedVolume) to materialize and persist chunks

use crate::math::Region;
use super::chunk::Chunk;

/// Source and sink for chunk data.
///
/// `page_in` fills a freshly allocated all-air chunk covering `region` and
/// returns false if no data could be produced. `page_out` is called before a
/// chunk leaves memory; persistence failures are the pager's own concern.
pub trait Pager: Send {
    fn page_in(&mut self, region: &Region, chunk: &mut Chunk) -> bool;

    fn page_out(&mut self, region: &Region, chunk: &Chunk);
}

/// Pager without a backing store: every chunk starts as air and evicted data is lost
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyPager;

impl Pager for EmptyPager {
    fn page_in(&mut self, _region: &Region, _chunk: &mut Chunk) -> bool {
        true
    }

    fn page_out(&mut self, _region: &Region, _chunk: &Chunk) {}
}
