pub mod checksum;
pub mod crypto;
pub mod codec;
pub mod floats;
pub mod header;
pub mod pipeline;
pub mod archive;

pub use checksum::calculate_checksum;
pub use crypto::{decrypt, decrypt_data, lfsr_step};
pub use codec::{decompress, decompress_data, CapacityError, Dictionary};
pub use floats::{join_float_array, join_float_array_three_stream};
pub use header::{HeaderError, PackedHeader};
pub use pipeline::{unpack, UnpackError, UnpackOptions, Unpacked};
