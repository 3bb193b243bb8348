pub mod flash_blobs;
