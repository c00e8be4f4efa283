//! 行リーダー: カノニカルモードの端末から 1 行を `read(2)` でブロッキング
//! 読み取りする。raw モードのライン編集（ヒストリナビゲーション、補完、
//! ハイライト）は一切行わない — Ctrl-C/Ctrl-Z がカーネルによって本物の
//! SIGINT/SIGTSTP として配送されるためには、端末が ICANON/ISIG を保ったま
//! までなければならない。

use std::io::Write;

const MAXLINE: usize = 4096;

/// `read_line` の結果。
pub enum Line {
    /// 改行までの 1 行（末尾の `\n` は除去済み）。
    Text(String),
    /// 入力の終端 (EOF)。
    Eof,
    /// SIGINT による EINTR。呼び出し側はプロンプトを再描画して再試行する。
    Interrupted,
}

/// `prompt` を出力してから 1 行読み取る。
pub fn read_line(prompt: &str) -> Line {
    print!("{}", prompt);
    let _ = std::io::stdout().flush();

    let mut buf = vec![0u8; MAXLINE];
    let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr() as *mut libc::c_void, MAXLINE) };

    if n < 0 {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        return if errno == libc::EINTR {
            Line::Interrupted
        } else {
            Line::Eof
        };
    }
    if n == 0 {
        return Line::Eof;
    }

    let mut text = String::from_utf8_lossy(&buf[..n as usize]).into_owned();
    if text.ends_with('\n') {
        text.pop();
    }
    Line::Text(text)
}
