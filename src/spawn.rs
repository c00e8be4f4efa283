//! 外部コマンドランチャー: `execvp(3)` によるイメージ置換。
//!
//! 既にフォークされた子プロセスの中からのみ呼ぶこと。成功すれば戻らない。
//! 失敗時は診断を出力し、慣例的な終了コードで `_exit` する — ここでの
//! エラーは呼び出し元に `Result` で伝播できない（呼び出し元はもう戻って
//! こない前提のプロセスなので）。
//!
//! `posix_spawnp` は使わない: `posix_spawn(3)` は子が `exec` 前に
//! `tcsetpgrp` を呼ぶフックを提供しないため、フォアグラウンドジョブの
//! 端末受け渡し (`do_job`/`do_pipeline`) と両立しない。生の `fork`+`execvp`
//! を使い、子はフォーク直後に自分で `setpgid`/`tcsetpgrp`/シグナル復元を
//! 行ってから `exec` する。

use std::ffi::CString;

/// argv 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
pub struct CStringVec {
    _strings: Vec<CString>,
    ptrs: Vec<*mut libc::c_char>,
}

impl CStringVec {
    /// 引数リストから構築する。フォーク前に呼んでおけば、子プロセスは
    /// コピーオンライトされたこのメモリをそのまま `execvp` に渡せる。
    pub fn from_args(args: &[String]) -> Self {
        let strings: Vec<CString> = args
            .iter()
            .map(|s| CString::new(s.as_str()).unwrap_or_else(|_| CString::new("").unwrap()))
            .collect();
        let mut ptrs: Vec<*mut libc::c_char> = strings
            .iter()
            .map(|s| s.as_ptr() as *mut libc::c_char)
            .collect();
        ptrs.push(std::ptr::null_mut());
        Self {
            _strings: strings,
            ptrs,
        }
    }

    pub fn as_ptr(&self) -> *const *mut libc::c_char {
        self.ptrs.as_ptr()
    }
}

/// `errno` から慣例的な終了コードへの変換。127 = command not found,
/// 126 = permission denied, それ以外は 126 にまとめる。
fn exit_code_for_errno(errno: libc::c_int) -> i32 {
    match errno {
        libc::ENOENT => 127,
        libc::EACCES => 126,
        _ => 126,
    }
}

/// `argv` で現在のプロセスイメージを置き換える。成功すれば戻らない。
///
/// 失敗時は `jsh: {argv[0]}: {message}` を stderr に出力し、127 (見つから
/// ない) または 126 (権限なし、その他) で `_exit` する。
pub fn exec(argv: &CStringVec, command_name: &str) -> ! {
    unsafe {
        libc::execvp(argv.as_ptr().read() as *const libc::c_char, argv.as_ptr());
    }

    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    let message = match errno {
        libc::ENOENT => "command not found",
        libc::EACCES => "permission denied",
        _ => "exec failed",
    };
    eprintln!("jsh: {}: {}", command_name, message);
    unsafe {
        libc::_exit(exit_code_for_errno(errno));
    }
}
