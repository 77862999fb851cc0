/// Local time as `YYYYMMDD_HHMMSS`, used to keep generated file names unique.
pub fn generation_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
