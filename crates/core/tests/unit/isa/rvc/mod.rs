pub mod decompression_mapping;
