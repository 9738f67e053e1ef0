pub mod decoders;
pub mod segmenter;
