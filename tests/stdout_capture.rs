//! Every check here redirects file descriptor 1, which is shared by the whole
//! test binary, so they run one after another inside a single test.
#![cfg(unix)]

use std::ffi::CString;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use tcl_kernel::capture::{FdRedirect, OutputCapture};
use tcl_kernel::kernel::{ExecuteRequest, StreamMessage, StreamName, TclKernel};
use tcl_kernel::tcl_runtime::create_runtime;

fn stdout_target() -> (u64, u64) {
    let stat = nix::sys::stat::fstat(libc::STDOUT_FILENO).expect("fstat stdout");
    (stat.st_dev as u64, stat.st_ino as u64)
}

fn write_stdout(text: &str) {
    let mut out = std::io::stdout().lock();
    out.write_all(text.as_bytes()).unwrap();
}

fn captures_text_and_returns_value(capture: &mut FdRedirect) {
    let captured = capture
        .run_capturing_output(|| {
            write_stdout("hello\n");
            7
        })
        .unwrap();
    assert_eq!(captured.text, "hello\n");
    assert_eq!(captured.value, 7);
}

fn unterminated_rust_output_is_flushed(capture: &mut FdRedirect) {
    let captured = capture
        .run_capturing_output(|| write_stdout("no newline"))
        .unwrap();
    assert_eq!(captured.text, "no newline");
}

fn c_stdio_output_is_flushed(capture: &mut FdRedirect) {
    let line = CString::new("from c").unwrap();
    let captured = capture
        .run_capturing_output(|| unsafe {
            libc::puts(line.as_ptr());
        })
        .unwrap();
    assert_eq!(captured.text, "from c\n");
}

fn sequential_windows_do_not_leak(capture: &mut FdRedirect) {
    let first = capture.run_capturing_output(|| write_stdout("first")).unwrap();
    let second = capture.run_capturing_output(|| write_stdout("second")).unwrap();
    assert_eq!(first.text, "first");
    assert_eq!(second.text, "second");

    let empty = capture.run_capturing_output(|| ()).unwrap();
    assert_eq!(empty.text, "");
}

fn output_pending_before_the_window_stays_out(capture: &mut FdRedirect) {
    // left in the Rust and C buffers, unterminated
    write_stdout("pre-rust ");
    let pending = CString::new("pre-c ").unwrap();
    unsafe {
        libc::printf(pending.as_ptr());
    }

    let captured = capture.run_capturing_output(|| write_stdout("inside")).unwrap();
    assert_eq!(captured.text, "inside");
}

fn failing_work_keeps_partial_output(capture: &mut FdRedirect) {
    let captured = capture
        .run_capturing_output(|| -> anyhow::Result<String> {
            write_stdout("partial\n");
            anyhow::bail!("work failed")
        })
        .unwrap();
    assert_eq!(captured.text, "partial\n");
    assert_eq!(captured.value.unwrap_err().to_string(), "work failed");
}

fn crlf_is_normalized(capture: &mut FdRedirect) {
    let captured = capture
        .run_capturing_output(|| write_stdout("a\r\nb\r\n"))
        .unwrap();
    assert_eq!(captured.text, "a\nb\n");
}

fn panic_restores_stdout(capture: &mut FdRedirect, original: (u64, u64)) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        capture.run_capturing_output(|| {
            write_stdout("about to panic\n");
            panic!("work unit panicked");
        })
    }));
    assert!(result.is_err());
    assert_eq!(stdout_target(), original);
}

fn kernel_publishes_puts_output() {
    let mut kernel = TclKernel::with_capture(create_runtime().unwrap(), FdRedirect);
    let mut published: Vec<StreamMessage> = Vec::new();

    let reply = kernel
        .execute(&ExecuteRequest::new("puts hello\nexpr {1 + 1}", 1), &mut published)
        .unwrap();
    assert_eq!(reply.execution_count, 1);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].name, StreamName::Stdout);
    assert_eq!(published[0].text, "hello\n2");

    published.clear();
    kernel
        .execute(&ExecuteRequest::new("puts -nonewline partial\nerror oops", 2), &mut published)
        .unwrap();
    assert_eq!(published[0].name, StreamName::Stderr);
    assert_eq!(published[0].text, "partialoops");

    published.clear();
    kernel
        .execute(&ExecuteRequest::new("puts quiet", 3).silent(), &mut published)
        .unwrap();
    assert!(published.is_empty());
}

#[test]
fn capture_window_behaviour() {
    let original = stdout_target();
    let mut capture = FdRedirect;

    captures_text_and_returns_value(&mut capture);
    unterminated_rust_output_is_flushed(&mut capture);
    c_stdio_output_is_flushed(&mut capture);
    sequential_windows_do_not_leak(&mut capture);
    output_pending_before_the_window_stays_out(&mut capture);
    failing_work_keeps_partial_output(&mut capture);
    crlf_is_normalized(&mut capture);
    assert_eq!(stdout_target(), original);

    panic_restores_stdout(&mut capture, original);
    kernel_publishes_puts_output();
    assert_eq!(stdout_target(), original);
}
