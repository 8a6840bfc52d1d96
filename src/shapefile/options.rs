use encoding::EncodingRef;

use crate::geo::GeometryFactory;
use super::dbf::encoding::DEFAULT_ENCODING;
use super::rings::RingStrategy;

/// How a `ShapefileReader` interprets what it reads.
#[derive(Clone)]
pub struct ReaderOptions {
    /// Forces the ".dbf" text encoding. `None` consults the ".cpg" sidecar,
    /// then the header's language driver, then falls back to Windows-1252.
    pub encoding: Option<EncodingRef>,
    pub ring_strategy: RingStrategy,
    /// Cross-check the ".shx" index before the first read.
    pub validate_index: bool,
    pub factory: GeometryFactory,
}

impl Default for ReaderOptions {
    fn default() -> ReaderOptions {
        ReaderOptions {
            encoding: None,
            ring_strategy: RingStrategy::default(),
            validate_index: false,
            factory: GeometryFactory::default(),
        }
    }
}

impl ReaderOptions {
    pub fn with_encoding(mut self, encoding: EncodingRef) -> ReaderOptions {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_ring_strategy(mut self, ring_strategy: RingStrategy) -> ReaderOptions {
        self.ring_strategy = ring_strategy;
        self
    }

    pub fn with_validation(mut self, validate_index: bool) -> ReaderOptions {
        self.validate_index = validate_index;
        self
    }

    pub fn with_factory(mut self, factory: GeometryFactory) -> ReaderOptions {
        self.factory = factory;
        self
    }
}

/// How a `ShapefileWriter` encodes what it writes.
#[derive(Clone)]
pub struct WriterOptions {
    pub encoding: EncodingRef,
    /// Write a ".cpg" sidecar naming `encoding` (path-based `create()` only).
    pub write_cpg: bool,
}

impl Default for WriterOptions {
    fn default() -> WriterOptions {
        WriterOptions {
            encoding: DEFAULT_ENCODING,
            write_cpg: true,
        }
    }
}

impl WriterOptions {
    pub fn with_encoding(mut self, encoding: EncodingRef) -> WriterOptions {
        self.encoding = encoding;
        self
    }

    pub fn with_cpg(mut self, write_cpg: bool) -> WriterOptions {
        self.write_cpg = write_cpg;
        self
    }
}
