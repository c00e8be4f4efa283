//! ジョブランチャー: `do_job`（単一コマンド）と `do_pipeline`（パイプライン）。
//!
//! どちらもフォーク/exec の機構を共有する。子は自分のプロセスグループを作り
//! （フォアグラウンドなら端末も取り）、シグナル既定動作を復元してから
//! [`crate::spawn::exec`] で置き換わる。親はプロセスグループ割り当てを
//! 子側と重複して行い（競合回避）、ジョブテーブルへ登録し、フォアグラウンド
//! なら [`crate::monitor::wait_for_fg`] へ入る。

use std::ffi::CString;
use std::fmt;
use std::os::unix::io::FromRawFd;

use crate::builtins;
use crate::glob;
use crate::monitor;
use crate::parser;
use crate::shell::Shell;
use crate::signals;
use crate::spawn;

/// リダイレクト解決済みの fd 群。矢印の向きごとに 1 枠のみ保持する — 同方向の
/// 後続リダイレクトは前の記述子を閉じてから上書きする（§4.5.1）。
#[derive(Default)]
struct ResolvedRedirects {
    stdin_fd: Option<i32>,
    stdout_fd: Option<i32>,
    stderr_fd: Option<i32>,
    fd_dups: Vec<(i32, i32)>,
}

impl ResolvedRedirects {
    fn close_all(&self) {
        for fd in [self.stdin_fd, self.stdout_fd, self.stderr_fd].into_iter().flatten() {
            unsafe {
                libc::close(fd);
            }
        }
    }
}

#[derive(Debug)]
struct RedirectError {
    target: String,
    message: String,
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.message)
    }
}

/// コマンド 1 つ分のリダイレクト列を左から右へ解決し、開いた fd を返す。
/// 失敗時は既に開いた fd をすべて閉じてから `Err` を返す — どの子も
/// 生き残らない（§8 境界条件）。
fn resolve_redirects(redirects: &[parser::Redirect]) -> Result<ResolvedRedirects, RedirectError> {
    let mut r = ResolvedRedirects::default();
    for redirect in redirects {
        let result = match &redirect.kind {
            parser::RedirectKind::Input => open_redirect(&redirect.target, libc::O_RDONLY, 0),
            parser::RedirectKind::Output => open_redirect(
                &redirect.target,
                libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC,
                0o700,
            ),
            parser::RedirectKind::Append => open_redirect(
                &redirect.target,
                libc::O_CREAT | libc::O_WRONLY | libc::O_APPEND,
                0o700,
            ),
            parser::RedirectKind::Stderr => open_redirect(
                &redirect.target,
                libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC,
                0o700,
            ),
            parser::RedirectKind::FdDup { src_fd, dst_fd } => {
                r.fd_dups.push((*src_fd, *dst_fd));
                continue;
            }
        };

        let fd = match result {
            Ok(fd) => fd,
            Err(message) => {
                r.close_all();
                return Err(RedirectError {
                    target: redirect.target.to_string(),
                    message,
                });
            }
        };

        let slot = match redirect.kind {
            parser::RedirectKind::Input => &mut r.stdin_fd,
            parser::RedirectKind::Output | parser::RedirectKind::Append => &mut r.stdout_fd,
            parser::RedirectKind::Stderr => &mut r.stderr_fd,
            parser::RedirectKind::FdDup { .. } => unreachable!(),
        };
        if let Some(old) = slot.replace(fd) {
            unsafe {
                libc::close(old);
            }
        }
    }
    Ok(r)
}

fn open_redirect(target: &str, flags: libc::c_int, mode: libc::mode_t) -> Result<i32, String> {
    let c_target = CString::new(target).map_err(|_| "invalid path".to_string())?;
    let fd = unsafe { libc::open(c_target.as_ptr(), flags, mode) };
    if fd < 0 {
        Err(std::io::Error::last_os_error().to_string())
    } else {
        Ok(fd)
    }
}

/// グロブ文字を含む引数をパス名展開し、残りはそのまま argv に積む。
fn expand_argv(cmd: &parser::Command) -> Vec<String> {
    let mut out = Vec::new();
    for arg in &cmd.args {
        if glob::has_glob_chars(arg) {
            out.extend(glob::expand(arg));
        } else {
            out.push(arg.to_string());
        }
    }
    out
}

fn reset_to_default(sig: libc::c_int) {
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
    }
}

/// `do_job` の子が exec 前に復元するディスポジション一式。
fn reset_job_control_signals() {
    reset_to_default(libc::SIGINT);
    reset_to_default(libc::SIGTSTP);
    reset_to_default(libc::SIGTTIN);
    reset_to_default(libc::SIGTTOU);
    reset_to_default(libc::SIGQUIT);
    reset_to_default(libc::SIGCHLD);
}

fn apply_redirects_to_child(r: &ResolvedRedirects, piped_stdin: Option<i32>, piped_stdout: Option<i32>) {
    if let Some(fd) = r.stdin_fd.or(piped_stdin) {
        unsafe {
            libc::dup2(fd, libc::STDIN_FILENO);
        }
    }
    if let Some(fd) = r.stdout_fd.or(piped_stdout) {
        unsafe {
            libc::dup2(fd, libc::STDOUT_FILENO);
        }
    }
    if let Some(fd) = r.stderr_fd {
        unsafe {
            libc::dup2(fd, libc::STDERR_FILENO);
        }
    }
    for &(src, dst) in &r.fd_dups {
        unsafe {
            libc::dup2(dst, src);
        }
    }
}

/// ビルトインをシェル自身の中で（フォークせずに）実行する。解決済みの
/// stdout リダイレクトがあれば、そこへ書き込む `Write` として渡す。
fn run_builtin_in_shell(shell: &mut Shell, argv: &[String], resolved: ResolvedRedirects) -> i32 {
    if let Some(fd) = resolved.stdin_fd {
        unsafe {
            libc::close(fd);
        }
    }
    if let Some(fd) = resolved.stderr_fd {
        unsafe {
            libc::close(fd);
        }
    }
    let args_ref: Vec<&str> = argv.iter().map(String::as_str).collect();
    match resolved.stdout_fd {
        Some(fd) => {
            let mut file = unsafe { std::fs::File::from_raw_fd(fd) };
            builtins::try_exec(shell, &args_ref, &mut file).unwrap_or(0)
        }
        None => {
            let mut stdout = std::io::stdout();
            builtins::try_exec(shell, &args_ref, &mut stdout).unwrap_or(0)
        }
    }
}

/// 単一コマンドの起動パス。§4.5 `do_job`。
pub fn do_job(shell: &mut Shell, cmd: &parser::Command, bg: bool) -> i32 {
    let argv = expand_argv(cmd);
    if argv.is_empty() {
        return 0;
    }

    let resolved = match resolve_redirects(&cmd.redirects) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("jsh: {}", e);
            return 1;
        }
    };

    if !bg && builtins::is_builtin(&argv[0]) {
        return run_builtin_in_shell(shell, &argv, resolved);
    }

    let region = signals::enter_blocked();
    let pid = unsafe { libc::fork() };
    if pid == 0 {
        unsafe {
            libc::setpgid(0, 0);
        }
        if !bg {
            shell.terminal.set_fg_pgrp(unsafe { libc::getpid() });
        }
        region.restore_in_child();
        reset_job_control_signals();
        apply_redirects_to_child(&resolved, None, None);
        resolved.close_all();
        let cargv = spawn::CStringVec::from_args(&argv);
        spawn::exec(&cargv, &argv[0]);
    }
    if pid < 0 {
        // 環境的なエラー（§7 カテゴリ 3）: 診断を出し、開いた fd を閉じて
        // プロンプトへ戻る。プログラマの不変条件違反ではないのでパニックしない。
        eprintln!("jsh: fork: {}", std::io::Error::last_os_error());
        resolved.close_all();
        return 1;
    }

    unsafe {
        libc::setpgid(pid, pid);
    }
    let j = shell.jobs.add_job(pid, bg, shell.terminal.shell_tmodes());
    shell.jobs.add_proc(j, pid, &argv);
    resolved.close_all();

    if !bg {
        monitor::wait_for_fg(shell, &region)
    } else {
        println!("[{}] running '{}'", j, shell.jobs.job_cmd(j));
        0
    }
}

/// パイプ作成は §7 カテゴリ 3 の環境的エラー: 失敗は `Err` として上へ返し、
/// 呼び出し側がパイプラインを打ち切る。
/// 既に起動済みの前段ステージ（`pgid` を共有するプロセスグループ）を終了させる。
/// `pgid == 0` はまだどのステージもフォークされていないことを意味し、その場合
/// `kill(-0, ...)` はシェル自身のプロセスグループへ送られてしまうため何もしない。
/// 停止中のプロセスが確実に SIGTERM を受け取れるよう `killjob` と同じ並びで
/// SIGCONT を続けて送る。
fn abort_launched_stages(pgid: libc::pid_t) {
    if pgid != 0 {
        unsafe {
            libc::kill(-pgid, libc::SIGTERM);
            libc::kill(-pgid, libc::SIGCONT);
        }
    }
}

fn make_pipe() -> Result<(i32, i32), String> {
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().to_string());
    }
    for fd in fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// パイプライン起動パス。§4.5 `do_pipeline`。単一ステージなら `do_job` と
/// 等価に振る舞う（§8 境界条件）。
pub fn do_pipeline(shell: &mut Shell, pipeline: &parser::Pipeline) -> i32 {
    if pipeline.commands.len() == 1 {
        return do_job(shell, &pipeline.commands[0], pipeline.background);
    }

    let bg = pipeline.background;
    let region = signals::enter_blocked();
    let mut pgid: libc::pid_t = 0;
    let mut job_idx: Option<usize> = None;
    let mut input_fd: Option<i32> = None;
    let n = pipeline.commands.len();

    for (i, cmd) in pipeline.commands.iter().enumerate() {
        let is_last = i == n - 1;
        let argv = expand_argv(cmd);
        if argv.is_empty() {
            if let Some(fd) = input_fd {
                unsafe {
                    libc::close(fd);
                }
            }
            eprintln!("jsh: syntax error near unexpected token");
            return 1;
        }

        let resolved = match resolve_redirects(&cmd.redirects) {
            Ok(r) => r,
            Err(e) => {
                if let Some(fd) = input_fd {
                    unsafe {
                        libc::close(fd);
                    }
                }
                abort_launched_stages(pgid);
                eprintln!("jsh: {}", e);
                return 1;
            }
        };

        let next_pipe = if is_last {
            None
        } else {
            match make_pipe() {
                Ok(p) => Some(p),
                Err(e) => {
                    eprintln!("jsh: pipe: {}", e);
                    if let Some(fd) = input_fd {
                        unsafe {
                            libc::close(fd);
                        }
                    }
                    resolved.close_all();
                    abort_launched_stages(pgid);
                    return 1;
                }
            }
        };

        let pid = unsafe { libc::fork() };
        if pid == 0 {
            unsafe {
                if pgid == 0 {
                    libc::setpgid(0, 0);
                } else {
                    libc::setpgid(0, pgid);
                }
            }
            region.restore_in_child();
            reset_job_control_signals();
            apply_redirects_to_child(&resolved, input_fd, next_pipe.map(|(_, w)| w));
            if let Some(fd) = input_fd {
                unsafe {
                    libc::close(fd);
                }
            }
            if let Some((r, w)) = next_pipe {
                unsafe {
                    libc::close(r);
                    libc::close(w);
                }
            }
            resolved.close_all();

            if builtins::is_builtin(&argv[0]) {
                let args_ref: Vec<&str> = argv.iter().map(String::as_str).collect();
                let mut stdout = std::io::stdout();
                let code = builtins::try_exec(shell, &args_ref, &mut stdout).unwrap_or(0);
                unsafe {
                    libc::_exit(code);
                }
            } else {
                let cargv = spawn::CStringVec::from_args(&argv);
                spawn::exec(&cargv, &argv[0]);
            }
        }
        if pid < 0 {
            // 環境的なエラー（§7 カテゴリ 3）。既に開いた fd を閉じて打ち切る。
            // 既に起動済みの前段ステージはジョブテーブルへ登録済みのため
            // 通常どおり回収される（単に新しいステージが参加しないだけ）。
            eprintln!("jsh: fork: {}", std::io::Error::last_os_error());
            if let Some(fd) = input_fd {
                unsafe {
                    libc::close(fd);
                }
            }
            if let Some((r, w)) = next_pipe {
                unsafe {
                    libc::close(r);
                    libc::close(w);
                }
            }
            resolved.close_all();
            return 1;
        }

        if pgid == 0 {
            pgid = pid;
        }
        unsafe {
            libc::setpgid(pid, pgid);
        }

        let j = *job_idx.get_or_insert_with(|| shell.jobs.add_job(pgid, bg, shell.terminal.shell_tmodes()));
        shell.jobs.add_proc(j, pid, &argv);

        if let Some(fd) = input_fd {
            unsafe {
                libc::close(fd);
            }
        }
        resolved.close_all();
        input_fd = next_pipe.map(|(r, w)| {
            unsafe {
                libc::close(w);
            }
            r
        });
    }

    let j = job_idx.expect("pipeline must launch at least one stage");
    if !bg {
        monitor::wait_for_fg(shell, &region)
    } else {
        println!("[{}] running '{}'", j, shell.jobs.job_cmd(j));
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_redirects_empty_is_noop() {
        let r = resolve_redirects(&[]).unwrap();
        assert!(r.stdin_fd.is_none());
        assert!(r.stdout_fd.is_none());
        assert!(r.stderr_fd.is_none());
        assert!(r.fd_dups.is_empty());
    }

    #[test]
    fn resolve_redirects_output_truncates_existing_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("jsh_test_redir_{}", std::process::id()));
        std::fs::write(&path, b"old content, long enough to detect truncation").unwrap();

        let redirects = vec![parser::Redirect {
            kind: parser::RedirectKind::Output,
            target: path.to_string_lossy().into_owned().into(),
        }];
        let r = resolve_redirects(&redirects).unwrap();
        assert!(r.stdout_fd.is_some());
        unsafe {
            libc::close(r.stdout_fd.unwrap());
        }
        let contents = std::fs::read(&path).unwrap();
        assert!(contents.is_empty());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn resolve_redirects_input_missing_file_fails_and_closes_nothing_else() {
        let redirects = vec![parser::Redirect {
            kind: parser::RedirectKind::Input,
            target: "/nonexistent/path/for/jsh/tests".into(),
        }];
        assert!(resolve_redirects(&redirects).is_err());
    }

    #[test]
    fn fd_dup_recorded_without_opening_a_file() {
        let redirects = vec![parser::Redirect {
            kind: parser::RedirectKind::FdDup { src_fd: 2, dst_fd: 1 },
            target: "".into(),
        }];
        let r = resolve_redirects(&redirects).unwrap();
        assert_eq!(r.fd_dups, vec![(2, 1)]);
    }
}
