//! ABI infrastructure: proxy detection, source resolution, signature
//! directory and recursive calldata decoding

mod calldata;
mod decoder;
mod directory;
mod proxy;
mod resolver;

pub use calldata::{
    parse_calldata, CalldataDecoder, CalldataError, DecodeBudget, DecodeRequest,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES, MAX_BATCH_CALLS,
};
pub use decoder::{
    decode_with_abi, decode_with_function, format_signature, selector_of, AbiDecodeError,
    FunctionDecode,
};
pub use directory::{
    parse_fragment, DirectoryError, FourByteDirectory, SignatureDirectory, SignatureFetcher,
    SignatureGuess, DEFAULT_DIRECTORY_URL, SIGNATURE_TTL,
};
pub use proxy::{detect_proxy, ProxyInfo, EIP1967_BEACON_SLOT, EIP1967_IMPLEMENTATION_SLOT};
pub use resolver::{AbiResolver, RESOLUTION_TTL};
