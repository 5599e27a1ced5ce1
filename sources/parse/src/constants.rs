pub const MAGIC: u32 = 0xCAFEBABE;

/// JDK 1.0.2
pub const MIN_SUPPORTED_MAJOR: u16 = 45;
/// JDK 21
pub const MAX_SUPPORTED_MAJOR: u16 = 65;

/// Major version emitted by the classfile writer (JDK 8).
pub const DEFAULT_MAJOR: u16 = 52;
