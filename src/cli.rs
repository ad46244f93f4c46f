//! Interactive line-protocol client for namespacedb-server.

use tokio::io::{stdin, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let address = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:6380".to_string());
    println!("connecting to {address}...");
    let mut stream = TcpStream::connect(&address).await?;
    println!("connected. type commands, or 'exit' to quit.");

    let mut stdin_reader = BufReader::new(stdin());
    let mut input = String::new();
    let mut response_buf = vec![0u8; 65536];

    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        input.clear();
        let n = stdin_reader.read_line(&mut input).await?;
        if n == 0 {
            break;
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;

        let n = stream.read(&mut response_buf).await?;
        if n == 0 {
            println!("server closed the connection");
            break;
        }
        print!("{}", String::from_utf8_lossy(&response_buf[..n]));
    }
    Ok(())
}
