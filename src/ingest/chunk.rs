use std::num::NonZeroUsize;

use crate::station::StationTriplet;

/// The unit of a single remote request.
pub type Chunk = Vec<StationTriplet>;

/// Splits `triplets` into chunks of `size`, keeping their order. The last
/// chunk holds the remainder.
pub fn chunk(triplets: &[StationTriplet], size: NonZeroUsize) -> Vec<Chunk> {
    triplets.chunks(size.get()).map(<[_]>::to_vec).collect()
}

// -- Tests -------------------------------------------------------------------
