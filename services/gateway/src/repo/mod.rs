pub mod buckets;
pub mod device_owners;
pub mod entry_codes;
pub mod users;
pub mod weather_cache;
