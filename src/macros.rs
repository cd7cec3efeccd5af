/// Like `writeln!`, but nicely wraps lines.
///
/// Unlike `writeln` and like `eprintln` panics if it can't write to
/// the specified stream.
macro_rules! wwriteln {
    {
        stream=$stream: expr
    } => {{
        let stream: &mut dyn std::io::Write = $stream;
        if let Err(err) = writeln!(stream) {
            panic!("Error writing to output stream: {}", err);
        }
    }};

    {
        stream=$stream: expr,
        indent=$i: expr,
        $($arg: expr),*
    } => {{
        let stream: &mut dyn std::io::Write = $stream;
        let i = $i;
        crate::output::wrapping::iwwriteln(
            stream,
            i.as_ref(), i.as_ref(),
            format_args!($($arg),*))
    }};

    {
        stream=$stream: expr,
        initial_indent=$ii: expr,
        $($arg: expr),*
    } => {{
        let stream: &mut dyn std::io::Write = $stream;
        let ii = $ii;
        let si = format!("{:1$}", "", ii.len());
        crate::output::wrapping::iwwriteln(
            stream, ii.as_ref(), si.as_ref(),
            format_args!($($arg),*))
    }};

    {
        stream=$stream: expr,
        $($arg: expr),*
    } => {{
        let stream: &mut dyn std::io::Write = $stream;
        crate::output::wrapping::wwriteln(
            stream, format_args!($($arg),*))
    }};
}

/// Like eprintln, but nicely wraps lines.
macro_rules! weprintln {
    { } => {
        wwriteln!(stream=&mut std::io::stderr())
    };

    {
        indent=$i: expr,
        $($arg: expr),*
    } => {
        wwriteln!(stream=&mut std::io::stderr(),
                  indent=$i,
                  $($arg),*)
    };

    {
        initial_indent=$ii: expr,
        $($arg: expr),*
    } => {
        wwriteln!(stream=&mut std::io::stderr(),
                  initial_indent=$ii,
                  $($arg),*)
    };

    {
        $($arg: expr),*
    } => {
        wwriteln!(stream=&mut std::io::stderr(), $($arg),*)
    };
}

/// Like weprintln, but doesn't emit anything in quiet mode.
macro_rules! qprintln {
    { quiet=$quiet: expr, $($arg: tt)* } => {
        if ! $quiet {
            weprintln!($($arg)*);
        }
    };
}
