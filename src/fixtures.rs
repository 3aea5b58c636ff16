#[cfg(test)]
pub mod test {
    /// A typical application `local.php` as written by an installer.
    pub const MAUTIC_LOCAL: &str = "<?php
// Generated by the installer.
return array (
  'db_driver' => 'pdo_mysql',
  'db_host' => 'db',
  'db_port' => 3306,
  'db_name' => 'mautic',
  'site_url' => 'https://marketing.example.com',
  'mailer_dsn' => 'smtp://localhost:25',
  'mailer_from_name' => 'Marketing',
  'mailer_from_email' => 'noreply@example.com',
  'api_rate_limiter_cache' => NULL,
  'trusted_hosts' =>
  array (
    0 => 'marketing.example.com',
    1 => 'localhost',
  ),
  'debug' => false,
  'cache_ttl' => 1.5,
);
";

    /// A document exercising nested maps and sequences.
    pub const NESTED: &str = "<?php

return [
    'cache' => [
        'adapter' => 'redis',
        'options' => [
            'servers' => [['redis-a', 6379], ['redis-b', 6380]],
            'timeout' => 2.5,
        ],
    ],
    'trusted_proxies' => [],
    'site_url' => 'https://example.com',
];
";
}
