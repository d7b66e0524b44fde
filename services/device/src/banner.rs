//! 配对码高亮输出。

use st_shared_protocol::RegisterData;

/// 终端高亮样式：重置。
const ANSI_RESET: &str = "\x1b[0m";
/// 终端高亮样式：粗体。
const ANSI_BOLD: &str = "\x1b[1m";
/// 终端高亮样式：青色。
const ANSI_CYAN: &str = "\x1b[36m";
/// 终端高亮样式：亮白。
const ANSI_WHITE: &str = "\x1b[97m";

/// 打印设备端配对区块。
pub(crate) fn print_code_banner(data: &RegisterData) {
    println!(
        "{cyan}{bold}\n╔══════════════════════════════════════╗\n\
         ║             设备配对                 ║\n\
         ╚══════════════════════════════════════╝{reset}",
        cyan = ANSI_CYAN,
        bold = ANSI_BOLD,
        reset = ANSI_RESET
    );
    println!(
        "{white}{bold}配对码:{reset} {white}{code}{reset}",
        white = ANSI_WHITE,
        bold = ANSI_BOLD,
        reset = ANSI_RESET,
        code = data.code
    );
    println!(
        "{white}{bold}设备 ID:{reset} {device}",
        white = ANSI_WHITE,
        bold = ANSI_BOLD,
        reset = ANSI_RESET,
        device = data.device_id
    );
    println!(
        "{white}{bold}提示:{reset} 请在已登录的网页端输入配对码，配对码将于 {exp}（unix 秒）过期。\n",
        white = ANSI_WHITE,
        bold = ANSI_BOLD,
        reset = ANSI_RESET,
        exp = data.expires_at
    );
}
