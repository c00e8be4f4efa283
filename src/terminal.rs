//! 端末コントローラ: 制御端末の複製ディスクリプタと、フォアグラウンド
//! オーナーシップの受け渡しを管理する。
//!
//! シェル起動時に標準入力を複製して close-on-exec を立てる — 子プロセスに
//! 端末ディスクリプタそのものを継承させないため（`tcsetpgrp` は継承された
//! 通常の fd 越しでも構わないが、余分な複製を exec 先に漏らさない）。

/// 制御端末ディスクリプタと、シェル自身のベースライン属性を所有する。
pub struct TerminalController {
    fd: libc::c_int,
    shell_tmodes: libc::termios,
}

impl TerminalController {
    /// 標準入力を複製し、close-on-exec を立て、シェル自身を端末の
    /// フォアグラウンドプロセスグループへ置き、ベースライン属性を読み取る。
    ///
    /// 呼び出し前に、シェルのプロセスグループがセッション ID と異なる場合は
    /// 呼び出し側が `setpgid(0, 0)` 済みであること — `tcsetpgrp` は既存かつ
    /// 同一セッションの pgid に対してのみ成功する。
    pub fn new(shell_pgid: libc::pid_t) -> Self {
        let fd = unsafe { libc::dup(libc::STDIN_FILENO) };
        assert!(fd >= 0, "failed to duplicate controlling terminal fd");
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }

        let mut shell_tmodes: libc::termios = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::tcgetattr(fd, &mut shell_tmodes) };
        assert!(rc == 0, "tcgetattr on controlling terminal failed");

        let controller = Self { fd, shell_tmodes };
        controller.set_fg_pgrp(shell_pgid);
        controller
    }

    pub fn fd(&self) -> libc::c_int {
        self.fd
    }

    pub fn shell_tmodes(&self) -> libc::termios {
        self.shell_tmodes
    }

    /// `pgid` を端末のフォアグラウンドプロセスグループとしてインストールする。
    pub fn set_fg_pgrp(&self, pgid: libc::pid_t) {
        let rc = unsafe { libc::tcsetpgrp(self.fd, pgid) };
        assert!(rc == 0, "tcsetpgrp failed on controlling terminal");
    }

    /// 端末の現在の属性を読み取る。
    pub fn save_attrs(&self) -> libc::termios {
        let mut tmodes: libc::termios = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::tcgetattr(self.fd, &mut tmodes) };
        assert!(rc == 0, "tcgetattr failed on controlling terminal");
        tmodes
    }

    /// 保留出力を drain してから属性を適用する（`TCSADRAIN`）。
    pub fn restore_attrs(&self, tmodes: &libc::termios) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSADRAIN, tmodes);
        }
    }
}

impl Drop for TerminalController {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    // 実端末 (isatty) が無いテスト環境で `TerminalController::new` を呼ぶと
    // tcgetattr が失敗して assert に落ちるため、ここでは純粋なロジックのみを
    // 対象にした単体テストは置かない。端末依存の振る舞いは手動の統合確認で
    // カバーする。
}
