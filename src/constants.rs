/// 请求体上限：答题请求很小，2 MiB 足够
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// 单次答题中允许的最大选项数
pub const MAX_SELECTED_OPTIONS: usize = 16;

/// 客户端上报的作答耗时上限（毫秒），超出视为异常输入
pub const MAX_REPORTED_ELAPSED_MS: u64 = 3_600_000;
