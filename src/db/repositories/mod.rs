pub mod fan;
